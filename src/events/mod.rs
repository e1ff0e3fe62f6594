pub mod keyboard;

pub use keyboard::{EventClass, KeyEvent, Modifiers};
