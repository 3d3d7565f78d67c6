pub mod keymap;

pub use keymap::{note_for_key, note_for_key_in_hand, KeyEvent, KeyMapper, Modifiers, KEY_MAP};
