use crate::events::Modifiers;
use crate::services::keycode_map::KeycodeMap;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub debounce: DebounceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub shortcuts: Vec<ShortcutMapping>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub default_delay_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { default_delay_ms: 250 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub state_url: String,
    pub drain_max_attempts: u32,
    pub drain_poll_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_url: "state.json".to_string(),
            drain_max_attempts: 100,
            drain_poll_interval_ms: 10,
        }
    }
}

/// Действие, которое выполняет горячая клавиша
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShortcutAction {
    /// Отложенное сохранение состояния
    Save,
    /// Перечитать состояние с диска
    Reload,
    /// Отменить ожидающее сохранение
    CancelSave,
    /// Только записать событие в лог
    Log,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShortcutMapping {
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub action: ShortcutAction,
}

impl ShortcutMapping {
    /// Код хоста для клавиши маппинга (`f5` -> `KeyF5`)
    pub fn code(&self) -> crate::error::Result<String> {
        KeycodeMap::resolve_code(&self.key)
    }

    pub fn modifiers(&self) -> Modifiers {
        Modifiers::from_vec(&self.modifiers)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("SHELL_KIT_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация хранилища
        if self.store.state_url.is_empty() {
            anyhow::bail!("store.state_url не может быть пустым");
        }

        if self.store.drain_max_attempts == 0 {
            anyhow::bail!("drain_max_attempts должно быть больше 0");
        }

        // Валидация горячих клавиш
        for (i, mapping) in self.shortcuts.iter().enumerate() {
            if mapping.key.is_empty() {
                anyhow::bail!("Пустая клавиша в горячей клавише #{}", i + 1);
            }

            if KeycodeMap::is_modifier(&mapping.key) {
                anyhow::bail!("Модификатор '{}' не может быть клавишей (#{})", mapping.key, i + 1);
            }

            mapping
                .code()
                .with_context(|| format!("Горячая клавиша #{}", i + 1))?;

            for modifier in &mapping.modifiers {
                match modifier.as_str() {
                    "ctrl" | "alt" | "shift" | "meta" => {}
                    _ => anyhow::bail!("Неверный модификатор '{}' в горячей клавише #{}", modifier, i + 1),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(key: &str, modifiers: &[&str], action: ShortcutAction) -> ShortcutMapping {
        ShortcutMapping {
            key: key.to_string(),
            modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
            action,
        }
    }

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.drain_max_attempts, 100);
    }

    #[test]
    fn test_shortcut_validation() {
        let mut config = Config::default();
        config.shortcuts = vec![
            mapping("f5", &[], ShortcutAction::Reload),
            mapping("KeyS", &["ctrl"], ShortcutAction::Save),
        ];
        assert!(config.validate().is_ok());

        config.shortcuts.push(mapping("s", &["hyper"], ShortcutAction::Save));
        assert!(config.validate().is_err());

        config.shortcuts.pop();
        config.shortcuts.push(mapping("ctrl", &[], ShortcutAction::Log));
        assert!(config.validate().is_err());

        config.shortcuts.pop();
        config.shortcuts.push(mapping("no_such_key", &[], ShortcutAction::Log));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_logging_and_store() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.store.drain_max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shell-kit.toml");
        std::fs::write(
            &path,
            r#"
[debounce]
default_delay_ms = 500

[store]
state_url = "file:///tmp/shell-state.json"

[[shortcuts]]
key = "f5"
action = "reload"

[[shortcuts]]
key = "s"
modifiers = ["ctrl"]
action = "cancel-save"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.debounce.default_delay_ms, 500);
        assert_eq!(config.store.state_url, "file:///tmp/shell-state.json");
        assert_eq!(config.store.drain_max_attempts, 100);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.shortcuts.len(), 2);
        assert_eq!(config.shortcuts[0].code().unwrap(), "KeyF5");
        assert_eq!(config.shortcuts[1].action, ShortcutAction::CancelSave);
        assert!(config.shortcuts[1].modifiers().ctrl);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert!(config.shortcuts.is_empty());
        assert_eq!(config.debounce.default_delay_ms, 250);
    }
}
