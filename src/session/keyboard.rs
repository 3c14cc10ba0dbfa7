// src/session/keyboard.rs

use std::str::FromStr;

/// Keys the test page reacts to, named after DOM `KeyboardEvent.key` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            " " | "Space" => Ok(Key::Space),
            "Enter" => Ok(Key::Enter),
            "ArrowLeft" => Ok(Key::ArrowLeft),
            "ArrowRight" => Ok(Key::ArrowRight),
            "ArrowUp" => Ok(Key::ArrowUp),
            "ArrowDown" => Ok(Key::ArrowDown),
            other => Err(format!("unbound key '{}'", other)),
        }
    }
}

/// Moves the highlighted choice one step, wrapping at both ends.
/// With nothing highlighted, up starts from the last choice and down from the first.
pub fn cycle_highlight(current: Option<usize>, choice_count: usize, up: bool) -> Option<usize> {
    if choice_count == 0 {
        return None;
    }
    let next = match current {
        None if up => choice_count - 1,
        None => 0,
        Some(i) if up => (i + choice_count - 1) % choice_count,
        Some(i) => (i + 1) % choice_count,
    };
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dom_key_names() {
        assert_eq!(" ".parse::<Key>().unwrap(), Key::Space);
        assert_eq!("ArrowRight".parse::<Key>().unwrap(), Key::ArrowRight);
        assert!("Tab".parse::<Key>().is_err());
    }

    #[test]
    fn test_cycle_wraps() {
        assert_eq!(cycle_highlight(None, 4, true), Some(3));
        assert_eq!(cycle_highlight(None, 4, false), Some(0));
        assert_eq!(cycle_highlight(Some(0), 4, true), Some(3));
        assert_eq!(cycle_highlight(Some(3), 4, false), Some(0));
        assert_eq!(cycle_highlight(Some(1), 4, false), Some(2));
        assert_eq!(cycle_highlight(Some(1), 0, false), None);
    }
}
