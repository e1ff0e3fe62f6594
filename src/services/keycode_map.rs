use crate::error::{Result, ShellError};
use std::collections::HashMap;
use once_cell::sync::Lazy;

/// Маппинг между короткими именами клавиш и кодами хоста (`KeyA`, `KeyF5`, ...)
pub struct KeycodeMap;

// Статическая карта основных клавиш
static KEY_NAME_TO_CODE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Буквенные клавиши
    map.insert("a", "KeyA");
    map.insert("b", "KeyB");
    map.insert("c", "KeyC");
    map.insert("d", "KeyD");
    map.insert("e", "KeyE");
    map.insert("f", "KeyF");
    map.insert("g", "KeyG");
    map.insert("h", "KeyH");
    map.insert("i", "KeyI");
    map.insert("j", "KeyJ");
    map.insert("k", "KeyK");
    map.insert("l", "KeyL");
    map.insert("m", "KeyM");
    map.insert("n", "KeyN");
    map.insert("o", "KeyO");
    map.insert("p", "KeyP");
    map.insert("q", "KeyQ");
    map.insert("r", "KeyR");
    map.insert("s", "KeyS");
    map.insert("t", "KeyT");
    map.insert("u", "KeyU");
    map.insert("v", "KeyV");
    map.insert("w", "KeyW");
    map.insert("x", "KeyX");
    map.insert("y", "KeyY");
    map.insert("z", "KeyZ");

    // Цифровые клавиши (верхний ряд)
    map.insert("1", "Key1");
    map.insert("2", "Key2");
    map.insert("3", "Key3");
    map.insert("4", "Key4");
    map.insert("5", "Key5");
    map.insert("6", "Key6");
    map.insert("7", "Key7");
    map.insert("8", "Key8");
    map.insert("9", "Key9");
    map.insert("0", "Key0");

    // Функциональные клавиши
    map.insert("f1", "KeyF1");
    map.insert("f2", "KeyF2");
    map.insert("f3", "KeyF3");
    map.insert("f4", "KeyF4");
    map.insert("f5", "KeyF5");
    map.insert("f6", "KeyF6");
    map.insert("f7", "KeyF7");
    map.insert("f8", "KeyF8");
    map.insert("f9", "KeyF9");
    map.insert("f10", "KeyF10");
    map.insert("f11", "KeyF11");
    map.insert("f12", "KeyF12");

    // Специальные клавиши
    map.insert("space", "KeySpace");
    map.insert("enter", "KeyReturn");
    map.insert("escape", "KeyEscape");
    map.insert("backspace", "KeyBack");
    map.insert("tab", "KeyTab");
    map.insert("delete", "KeyDelete");

    // Стрелки
    map.insert("up", "KeyUp");
    map.insert("down", "KeyDown");
    map.insert("left", "KeyLeft");
    map.insert("right", "KeyRight");

    map
});

static CODE_TO_KEY_NAME: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    KEY_NAME_TO_CODE.iter().map(|(&name, &code)| (code, name)).collect()
});

impl KeycodeMap {
    /// Префикс, которым хост помечает коды клавиш
    pub const VENDOR_PREFIX: &'static str = "Key";

    /// Получить код клавиши по короткому имени (регистронезависимо).
    /// Полный код с префиксом возвращается без изменений.
    pub fn resolve_code(key_name: &str) -> Result<String> {
        if Self::is_host_code(key_name) {
            return Ok(key_name.to_string());
        }

        let normalized = key_name.to_lowercase();
        KEY_NAME_TO_CODE
            .get(normalized.as_str())
            .map(|code| code.to_string())
            .ok_or_else(|| ShellError::InvalidArgument(format!("Неизвестная клавиша: {}", key_name)))
    }

    /// Короткое имя для известного кода хоста
    pub fn get_key_name(code: &str) -> Option<&'static str> {
        CODE_TO_KEY_NAME.get(code).copied()
    }

    /// Имя клавиши без префикса производителя: `KeyF5` -> `F5`
    pub fn bare_name(code: &str) -> &str {
        match code.strip_prefix(Self::VENDOR_PREFIX) {
            Some(rest) if !rest.is_empty() => rest,
            _ => code,
        }
    }

    /// Полный код хоста: префикс и хотя бы один символ после него
    pub fn is_host_code(key_name: &str) -> bool {
        key_name.len() > Self::VENDOR_PREFIX.len() && key_name.starts_with(Self::VENDOR_PREFIX)
    }

    /// Проверить, является ли клавиша модификатором
    pub fn is_modifier(key_name: &str) -> bool {
        let normalized = key_name.to_lowercase();
        matches!(normalized.as_str(), "ctrl" | "alt" | "shift" | "meta")
    }
}
