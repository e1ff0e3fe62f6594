//! Горячие клавиши, debounce и асинхронное сохранение JSON для окна десктопной оболочки.

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod services;
mod utils;

pub use app::ShellApp;
pub use config::Config;
pub use error::{Result, ShellError};
pub use events::{EventClass, KeyEvent, Modifiers};
pub use services::{
    key_event_label, DebounceKey, DebounceScheduler, DispatchOutcome, DrainOutcome, Element,
    EventTarget, JsonDocument, JsonStore, SaveTask, ShortcutHandler, ShortcutRegistry, ShortcutSpec,
};
