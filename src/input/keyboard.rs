//! Keyboard input handling

use winit::keyboard::{KeyCode, PhysicalKey};

use crate::jfa::seeds::CATALOG_LEN;

/// Keys the viewer reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    F1,
    F2,
    Escape,
    Other,
}

impl Key {
    pub fn from_winit(physical: &PhysicalKey) -> Self {
        let PhysicalKey::Code(code) = physical else {
            return Key::Other;
        };
        match code {
            KeyCode::Digit1 => Key::Digit(1),
            KeyCode::Digit2 => Key::Digit(2),
            KeyCode::Digit3 => Key::Digit(3),
            KeyCode::Digit4 => Key::Digit(4),
            KeyCode::Digit5 => Key::Digit(5),
            KeyCode::Digit6 => Key::Digit(6),
            KeyCode::Digit7 => Key::Digit(7),
            KeyCode::Digit8 => Key::Digit(8),
            KeyCode::Digit9 => Key::Digit(9),
            KeyCode::F1 => Key::F1,
            KeyCode::F2 => Key::F2,
            KeyCode::Escape => Key::Escape,
            _ => Key::Other,
        }
    }
}

/// An application-level command distilled from a key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Load catalog shape N (1-based) as the new seed image.
    SelectShape(u8),
    /// Display the computed distance field.
    UseAlgorithm,
    /// Display the raw seed texture.
    ShowRaw,
    Quit,
}

/// Map a pressed key to its command, if any. Digits outside the catalog
/// range are ignored rather than clamped.
pub fn command_for(key: Key) -> Option<Command> {
    match key {
        Key::Digit(n) if (1..=CATALOG_LEN).contains(&n) => Some(Command::SelectShape(n)),
        Key::F1 => Some(Command::UseAlgorithm),
        Key::F2 => Some(Command::ShowRaw),
        Key::Escape => Some(Command::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_select_catalog_shapes() {
        for n in 1..=CATALOG_LEN {
            assert_eq!(command_for(Key::Digit(n)), Some(Command::SelectShape(n)));
        }
    }

    #[test]
    fn test_out_of_catalog_digits_are_ignored() {
        assert_eq!(command_for(Key::Digit(5)), None);
        assert_eq!(command_for(Key::Digit(9)), None);
        assert_eq!(command_for(Key::Digit(0)), None);
    }

    #[test]
    fn test_mode_and_quit_keys() {
        assert_eq!(command_for(Key::F1), Some(Command::UseAlgorithm));
        assert_eq!(command_for(Key::F2), Some(Command::ShowRaw));
        assert_eq!(command_for(Key::Escape), Some(Command::Quit));
        assert_eq!(command_for(Key::Other), None);
    }

    #[test]
    fn test_winit_mapping() {
        assert_eq!(
            Key::from_winit(&PhysicalKey::Code(KeyCode::Digit3)),
            Key::Digit(3)
        );
        assert_eq!(Key::from_winit(&PhysicalKey::Code(KeyCode::F1)), Key::F1);
        assert_eq!(
            Key::from_winit(&PhysicalKey::Code(KeyCode::Space)),
            Key::Other
        );
    }
}
