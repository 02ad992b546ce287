//! Key-name to key-code translation
//!
//! Configuration files refer to keys by name ("W", "Tab", "F8"); the input
//! source reports numeric codes. Unknown names are a fatal configuration
//! error surfaced before the scheduler starts.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use thiserror::Error;

/// Opaque key code as reported by the input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u16);

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("unknown key name: {0:?}")]
    Unknown(String),
}

static KEYCODES: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    HashMap::from([
        // letters
        ("A", 0),
        ("S", 1),
        ("D", 2),
        ("F", 3),
        ("H", 4),
        ("G", 5),
        ("Z", 6),
        ("X", 7),
        ("C", 8),
        ("V", 9),
        ("B", 11),
        ("Q", 12),
        ("W", 13),
        ("E", 14),
        ("R", 15),
        ("Y", 16),
        ("T", 17),
        ("U", 32),
        ("I", 34),
        ("O", 31),
        ("P", 35),
        ("J", 38),
        ("K", 40),
        ("L", 37),
        ("M", 46),
        ("N", 45),
        // number row
        ("1", 18),
        ("2", 19),
        ("3", 20),
        ("4", 21),
        ("5", 23),
        ("6", 22),
        ("7", 26),
        ("8", 28),
        ("9", 25),
        ("0", 29),
        // specials
        ("Tab", 48),
        ("Space", 49),
        ("Escape", 53),
        ("CapsLock", 57),
        ("Shift", 56),
        ("Control", 59),
        ("Option", 58),
        ("UpArrow", 126),
        ("DownArrow", 125),
        ("LeftArrow", 123),
        ("RightArrow", 124),
        // function row
        ("F1", 122),
        ("F2", 120),
        ("F3", 99),
        ("F4", 118),
        ("F5", 96),
        ("F6", 97),
        ("F7", 98),
        ("F8", 100),
        ("F9", 101),
        ("F10", 109),
        ("F11", 103),
        ("F12", 111),
    ])
});

/// Resolve a key name to its code. Matching is case-insensitive.
pub fn keycode_for(name: &str) -> Result<KeyCode, KeyError> {
    let wanted = name.trim();
    if let Some(code) = KEYCODES.get(wanted) {
        return Ok(KeyCode(*code));
    }
    KEYCODES
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
        .map(|(_, code)| KeyCode(*code))
        .ok_or_else(|| KeyError::Unknown(name.to_string()))
}
