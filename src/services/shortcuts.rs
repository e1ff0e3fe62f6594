//! ShortcutRegistry: привязка комбинаций клавиш к обработчикам на элементе.
//!
//! Каждая регистрация - отдельный слушатель key-up на элементе. Несколько
//! регистраций на одном элементе срабатывают независимо, в порядке регистрации.
//!
//! Совпадение проверяет код клавиши, ctrl, shift и alt. Флаг meta нормализуется,
//! но в сравнении не участвует: регистрация с `meta_key: Some(true)` срабатывает
//! при любом состоянии meta у события.

use crate::error::{Result, ShellError};
use crate::events::{EventClass, KeyEvent, Modifiers};
use crate::services::element::{EventTarget, ListenerId};
use crate::services::keycode_map::KeycodeMap;
use crate::debug_if_enabled;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Обработчик горячей клавиши. `Some(true)` - событие поглощено.
pub type ShortcutHandler = Arc<dyn Fn(&KeyEvent) -> Option<bool> + Send + Sync>;

/// Описание горячей клавиши в том виде, в каком его передаёт вызывающий код
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutSpec {
    pub key: Option<String>,
    pub ctrl_key: Option<bool>,
    pub shift_key: Option<bool>,
    pub alt_key: Option<bool>,
    pub meta_key: Option<bool>,
}

impl ShortcutSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn with_ctrl(mut self, ctrl: bool) -> Self {
        self.ctrl_key = Some(ctrl);
        self
    }

    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift_key = Some(shift);
        self
    }

    pub fn with_alt(mut self, alt: bool) -> Self {
        self.alt_key = Some(alt);
        self
    }

    pub fn with_meta(mut self, meta: bool) -> Self {
        self.meta_key = Some(meta);
        self
    }

    /// Спецификация из кода клавиши и набора модификаторов (все флаги заданы явно)
    pub fn from_modifiers(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self::new(key)
            .with_ctrl(modifiers.ctrl)
            .with_shift(modifiers.shift)
            .with_alt(modifiers.alt)
            .with_meta(modifiers.meta)
    }

    /// Подставить значения по умолчанию для модификаторов
    pub fn normalize(self) -> Result<NormalizedShortcut> {
        let key = match self.key {
            Some(key) if !key.is_empty() => key,
            _ => return ShellError::invalid_argument("у горячей клавиши не задан key"),
        };

        Ok(NormalizedShortcut {
            key,
            modifiers: Modifiers {
                ctrl: self.ctrl_key.unwrap_or(false),
                alt: self.alt_key.unwrap_or(false),
                shift: self.shift_key.unwrap_or(false),
                meta: self.meta_key.unwrap_or(false),
            },
        })
    }
}

/// Зарегистрированная комбинация, все флаги определены
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedShortcut {
    pub key: String,
    pub modifiers: Modifiers,
}

impl NormalizedShortcut {
    /// Точное сравнение кода и ctrl/shift/alt. meta не проверяется.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.code == self.key
            && event.modifiers.ctrl == self.modifiers.ctrl
            && event.modifiers.shift == self.modifiers.shift
            && event.modifiers.alt == self.modifiers.alt
    }
}

/// Запись о выполненной регистрации
#[derive(Debug, Clone)]
pub struct RegisteredShortcut {
    pub element: String,
    pub listener: ListenerId,
    pub shortcut: NormalizedShortcut,
}

#[derive(Default)]
pub struct ShortcutRegistry {
    registered: RwLock<Vec<RegisteredShortcut>>,
}

impl ShortcutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать горячую клавишу. `false` - регистрация не выполнена
    /// и слушатель не установлен.
    pub fn register<E>(
        &self,
        element: Option<&E>,
        spec: Option<ShortcutSpec>,
        handler: Option<ShortcutHandler>,
    ) -> bool
    where
        E: EventTarget + ?Sized,
    {
        match self.try_register(element, spec, handler) {
            Ok(_) => true,
            Err(e) => {
                warn!("Горячая клавиша не зарегистрирована: {}", e);
                false
            }
        }
    }

    /// Как `register`, но с причиной отказа
    pub fn try_register<E>(
        &self,
        element: Option<&E>,
        spec: Option<ShortcutSpec>,
        handler: Option<ShortcutHandler>,
    ) -> Result<ListenerId>
    where
        E: EventTarget + ?Sized,
    {
        let element = element
            .ok_or_else(|| ShellError::InvalidArgument("не задан элемент".to_string()))?;
        let spec = spec
            .ok_or_else(|| ShellError::InvalidArgument("не задано описание горячей клавиши".to_string()))?;
        let handler = handler
            .ok_or_else(|| ShellError::InvalidArgument("не задан обработчик".to_string()))?;
        let shortcut = spec.normalize()?;

        let matcher = shortcut.clone();
        let listener = element.on(
            EventClass::KeyUp,
            Arc::new(move |event: &KeyEvent| {
                if !matcher.matches(event) {
                    return None;
                }
                debug_if_enabled!("Совпадение горячей клавиши: {}", key_event_label(event));
                handler(event)
            }),
        );

        info!(
            "Горячая клавиша {}+{} зарегистрирована на '{}'",
            shortcut.modifiers,
            shortcut.key,
            element.name()
        );

        self.registered.write().push(RegisteredShortcut {
            element: element.name().to_string(),
            listener,
            shortcut,
        });

        Ok(listener)
    }

    /// Все выполненные регистрации в порядке регистрации
    pub fn registered(&self) -> Vec<RegisteredShortcut> {
        self.registered.read().clone()
    }

    pub fn len(&self) -> usize {
        self.registered.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.read().is_empty()
    }
}

/// Читаемая подпись события для диагностики: `meta ctrl alt shift F5`
pub fn key_event_label(event: &KeyEvent) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(5);
    if event.modifiers.meta { parts.push("meta"); }
    if event.modifiers.ctrl { parts.push("ctrl"); }
    if event.modifiers.alt { parts.push("alt"); }
    if event.modifiers.shift { parts.push("shift"); }
    parts.push(KeycodeMap::bare_name(&event.code));
    parts.join(" ")
}
