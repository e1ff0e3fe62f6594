use crate::error::{Result, ShellError};
use crate::services::keycode_map::KeycodeMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Класс события клавиатуры, на который подписывается слушатель
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventClass {
    KeyDown,
    KeyUp,
}

impl EventClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventClass::KeyDown => "keydown",
            EventClass::KeyUp => "keyup",
        }
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Модификаторы клавиш
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ctrl(mut self, ctrl: bool) -> Self {
        self.ctrl = ctrl;
        self
    }

    pub fn with_alt(mut self, alt: bool) -> Self {
        self.alt = alt;
        self
    }

    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_meta(mut self, meta: bool) -> Self {
        self.meta = meta;
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift && !self.meta
    }

    pub fn to_vec(&self) -> Vec<String> {
        let mut result = Vec::new();
        if self.ctrl { result.push("ctrl".to_string()); }
        if self.alt { result.push("alt".to_string()); }
        if self.shift { result.push("shift".to_string()); }
        if self.meta { result.push("meta".to_string()); }
        result
    }

    /// Неизвестные имена пропускаются, строгая проверка выполняется в Config::validate
    pub fn from_vec(modifiers: &[String]) -> Self {
        let mut result = Self::new();
        for modifier in modifiers {
            let _ = result.set_by_name(modifier);
        }
        result
    }

    /// Включить модификатор по имени, false если имя неизвестно
    pub fn set_by_name(&mut self, name: &str) -> bool {
        match name.to_lowercase().as_str() {
            "ctrl" | "control" => self.ctrl = true,
            "alt" | "option" => self.alt = true,
            "shift" => self.shift = true,
            "meta" | "super" | "cmd" => self.meta = true,
            _ => return false,
        }
        true
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifiers = self.to_vec();
        if modifiers.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", modifiers.join("+"))
        }
    }
}

/// Событие клавиатуры в форме, которую отдаёт хост: код клавиши и флаги модификаторов
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: EventClass,
    pub code: String,
    pub modifiers: Modifiers,
    pub timestamp: std::time::Instant,
}

impl KeyEvent {
    pub fn new(kind: EventClass, code: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            kind,
            code: code.into(),
            modifiers,
            timestamp: std::time::Instant::now(),
        }
    }

    pub fn key_up(code: impl Into<String>, modifiers: Modifiers) -> Self {
        Self::new(EventClass::KeyUp, code, modifiers)
    }

    pub fn key_down(code: impl Into<String>, modifiers: Modifiers) -> Self {
        Self::new(EventClass::KeyDown, code, modifiers)
    }

    /// Получить уникальный идентификатор комбинации клавиш
    pub fn combination_id(&self) -> String {
        if self.modifiers.is_empty() {
            self.code.clone()
        } else {
            format!("{}+{}", self.modifiers, self.code)
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({}ms)",
            crate::services::shortcuts::key_event_label(self),
            self.kind,
            self.timestamp.elapsed().as_millis()
        )
    }
}

/// Разбор комбинации вида `ctrl+shift+KeyS` или `f5` в событие key-up
impl FromStr for KeyEvent {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s
            .split('+')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let Some((key, modifier_names)) = parts.split_last() else {
            return ShellError::invalid_argument(format!("Пустая комбинация клавиш: '{}'", s));
        };

        let mut modifiers = Modifiers::new();
        for name in modifier_names {
            if !modifiers.set_by_name(name) {
                return ShellError::invalid_argument(format!(
                    "Неизвестный модификатор '{}' в комбинации '{}'",
                    name, s
                ));
            }
        }

        let code = KeycodeMap::resolve_code(key)?;
        Ok(Self::key_up(code, modifiers))
    }
}
