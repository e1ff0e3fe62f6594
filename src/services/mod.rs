pub mod debouncer;
pub mod element;
pub mod json_store;
pub mod keycode_map;
pub mod shortcuts;

pub use debouncer::{DebounceKey, DebounceScheduler};
pub use element::{DispatchOutcome, Element, EventTarget, Listener, ListenerId};
pub use json_store::{DrainOutcome, JsonDocument, JsonStore, SaveTask};
pub use keycode_map::KeycodeMap;
pub use shortcuts::{key_event_label, NormalizedShortcut, ShortcutHandler, ShortcutRegistry, ShortcutSpec};
