//! Player preferences: board size, colour theme and sound.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::grid::GridSize;

/// Colour theme requested by the player. `Auto` follows the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Dark,
    Light,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Theme::Auto),
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Auto => "auto",
            Theme::Dark => "dark",
            Theme::Light => "light",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preferences {
    pub size: GridSize,
    pub theme: Theme,
    pub sound: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            size: GridSize::default(),
            theme: Theme::Auto,
            sound: true,
        }
    }
}

/// Lenient on-disk shape; every field may be absent or wrong.
#[derive(Deserialize)]
struct RawPreferences {
    size: Option<serde_json::Value>,
    theme: Option<serde_json::Value>,
    sound: Option<serde_json::Value>,
}

impl Preferences {
    /// Parse a stored preferences record. Never fails: anything unreadable
    /// falls back to the default for that field, or to all defaults.
    pub fn parse(raw: &str) -> Self {
        let defaults = Self::default();
        let Ok(Some(raw)) = serde_json::from_str::<Option<RawPreferences>>(raw) else {
            return defaults;
        };

        let size = raw
            .size
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| GridSize::new(usize::try_from(n).ok()?))
            .unwrap_or(defaults.size);
        let theme = raw
            .theme
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.theme);
        let sound = raw
            .sound
            .as_ref()
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(defaults.sound);

        Self { size, theme, sound }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({
            "size": self.size.get(),
            "theme": self.theme,
            "sound": self.sound,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Preferences::default();
        assert_eq!(p.size.get(), 4);
        assert_eq!(p.theme, Theme::Auto);
        assert!(p.sound);
    }

    #[test]
    fn test_parse_round_trip() {
        let p = Preferences {
            size: GridSize::new(6).unwrap(),
            theme: Theme::Dark,
            sound: false,
        };
        assert_eq!(Preferences::parse(&p.to_json()), p);
    }

    #[test]
    fn test_parse_garbage_gives_defaults() {
        assert_eq!(Preferences::parse("not json"), Preferences::default());
        assert_eq!(Preferences::parse("null"), Preferences::default());
        assert_eq!(Preferences::parse("[1,2]"), Preferences::default());
    }

    #[test]
    fn test_parse_bad_fields_individually() {
        let p = Preferences::parse(r#"{"size": 12, "theme": "light", "sound": "yes"}"#);
        assert_eq!(p.size.get(), 4);
        assert_eq!(p.theme, Theme::Light);
        assert!(p.sound);
    }

    #[test]
    fn test_theme_serializes_lowercase() {
        let json = Preferences {
            theme: Theme::Light,
            ..Preferences::default()
        }
        .to_json();
        assert!(json.contains(r#""theme":"light""#));
    }

    #[test]
    fn test_theme_from_str() {
        assert_eq!("DARK".parse::<Theme>(), Ok(Theme::Dark));
        assert!("sepia".parse::<Theme>().is_err());
    }
}
