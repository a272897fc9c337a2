//! Keyboard shortcuts and toolbar commands.

use crate::gizmo::GizmoMode;
use winit::keyboard::Key;

/// Something the user asked the gizmo to do, by key or by button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetMode(GizmoMode),
    ToggleControls,
}

impl Command {
    /// Toolbar buttons, in display order.
    pub const BUTTONS: [(&'static str, Command); 4] = [
        ("translate", Command::SetMode(GizmoMode::Translate)),
        ("rotate", Command::SetMode(GizmoMode::Rotate)),
        ("scale", Command::SetMode(GizmoMode::Scale)),
        ("togglecontrols", Command::ToggleControls),
    ];

    /// Maps typed text to a command. Case-sensitive, like the key names.
    pub fn from_text(text: &str) -> Option<Self> {
        match text {
            "t" => Some(Self::SetMode(GizmoMode::Translate)),
            "r" => Some(Self::SetMode(GizmoMode::Rotate)),
            "s" => Some(Self::SetMode(GizmoMode::Scale)),
            "c" => Some(Self::ToggleControls),
            _ => None,
        }
    }

    pub fn from_key(key: &Key) -> Option<Self> {
        match key {
            Key::Character(text) => Self::from_text(text.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::NamedKey;

    #[test]
    fn shortcut_letters() {
        assert_eq!(Command::from_text("t"), Some(Command::SetMode(GizmoMode::Translate)));
        assert_eq!(Command::from_text("r"), Some(Command::SetMode(GizmoMode::Rotate)));
        assert_eq!(Command::from_text("s"), Some(Command::SetMode(GizmoMode::Scale)));
        assert_eq!(Command::from_text("c"), Some(Command::ToggleControls));
        assert_eq!(Command::from_text("T"), None);
        assert_eq!(Command::from_text("x"), None);
    }

    #[test]
    fn named_keys_are_ignored() {
        assert_eq!(Command::from_key(&Key::Named(NamedKey::Escape)), None);
        assert_eq!(
            Command::from_key(&Key::Character("c".into())),
            Some(Command::ToggleControls)
        );
    }

    #[test]
    fn buttons_mirror_shortcuts() {
        for ((_, button), key) in Command::BUTTONS.iter().zip(["t", "r", "s", "c"]) {
            assert_eq!(Some(*button), Command::from_text(key));
        }
    }
}
