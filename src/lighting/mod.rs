pub mod snap;

use std::{fmt, str::FromStr, sync::Arc};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

pub use snap::{snap, LIGHT_LEVELS};

// ---------------------------------------------------------------------------
// LightingOverride
// ---------------------------------------------------------------------------

/// Manual lighting override set by a client and polled by the device.
///
/// `Auto` hands control back to the presence-driven automation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LightingOverride {
    #[default]
    Auto,
    Level(u8),
}

impl LightingOverride {
    pub fn is_manual(&self) -> bool {
        matches!(self, LightingOverride::Level(_))
    }

    fn level(value: u64) -> Result<Self, InvalidLightingLevel> {
        LIGHT_LEVELS
            .iter()
            .copied()
            .find(|&l| u64::from(l) == value)
            .map(LightingOverride::Level)
            .ok_or_else(|| InvalidLightingLevel(value.to_string()))
    }
}

impl fmt::Display for LightingOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightingOverride::Auto => f.write_str("auto"),
            LightingOverride::Level(level) => write!(f, "{level}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("lighting mode must be \"auto\" or one of 0, 25, 50, 75, 100 (got {0})")]
pub struct InvalidLightingLevel(pub String);

impl FromStr for LightingOverride {
    type Err = InvalidLightingLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "auto" {
            return Ok(LightingOverride::Auto);
        }
        s.parse::<u64>()
            .map_err(|_| InvalidLightingLevel(format!("{s:?}")))
            .and_then(LightingOverride::level)
    }
}

/// Accepts `"auto"`, an integral JSON number, or a numeric string.
impl TryFrom<&Value> for LightingOverride {
    type Error = InvalidLightingLevel;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => s.parse(),
            Value::Number(n) => match n.as_u64() {
                Some(v) => LightingOverride::level(v),
                None => match n.as_f64() {
                    Some(v) if v >= 0.0 && v.fract() == 0.0 => LightingOverride::level(v as u64),
                    _ => Err(InvalidLightingLevel(n.to_string())),
                },
            },
            other => Err(InvalidLightingLevel(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// LightingControl
// ---------------------------------------------------------------------------

/// Holds the current lighting override. Devices only read it; a poll never
/// resets the value.
#[derive(Clone, Default)]
pub struct LightingControl {
    mode: Arc<RwLock<LightingOverride>>,
}

impl LightingControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, mode: LightingOverride) {
        let mut guard = self.mode.write().await;
        if *guard != mode {
            info!(from = %*guard, to = %mode, "Lighting override changed");
        }
        *guard = mode;
    }

    pub async fn get(&self) -> LightingOverride {
        *self.mode.read().await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_auto_and_levels() {
        assert_eq!("auto".parse::<LightingOverride>(), Ok(LightingOverride::Auto));
        assert_eq!("75".parse::<LightingOverride>(), Ok(LightingOverride::Level(75)));
        assert_eq!(" 0 ".parse::<LightingOverride>(), Ok(LightingOverride::Level(0)));
    }

    #[test]
    fn rejects_non_enumerated_level() {
        assert!("60".parse::<LightingOverride>().is_err());
        assert!("bright".parse::<LightingOverride>().is_err());
        assert!(LightingOverride::try_from(&json!(101)).is_err());
        assert!(LightingOverride::try_from(&json!(-25)).is_err());
        assert!(LightingOverride::try_from(&json!(true)).is_err());
    }

    #[test]
    fn accepts_json_numbers_and_numeric_strings() {
        assert_eq!(
            LightingOverride::try_from(&json!(50)),
            Ok(LightingOverride::Level(50))
        );
        assert_eq!(
            LightingOverride::try_from(&json!(25.0)),
            Ok(LightingOverride::Level(25))
        );
        assert_eq!(
            LightingOverride::try_from(&json!("100")),
            Ok(LightingOverride::Level(100))
        );
        assert_eq!(
            LightingOverride::try_from(&json!("auto")),
            Ok(LightingOverride::Auto)
        );
    }

    #[test]
    fn display_matches_device_wire_format() {
        assert_eq!(LightingOverride::Auto.to_string(), "auto");
        assert_eq!(LightingOverride::Level(25).to_string(), "25");
    }

    #[tokio::test]
    async fn defaults_to_auto() {
        let control = LightingControl::new();
        assert_eq!(control.get().await, LightingOverride::Auto);
        assert!(!control.get().await.is_manual());
    }

    #[tokio::test]
    async fn polling_does_not_reset_override() {
        let control = LightingControl::new();
        control.set(LightingOverride::Level(75)).await;

        assert_eq!(control.get().await, LightingOverride::Level(75));
        assert_eq!(control.get().await, LightingOverride::Level(75));
        assert!(control.get().await.is_manual());
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let control = LightingControl::new();
        let clone = control.clone();

        control.set(LightingOverride::Level(0)).await;
        assert_eq!(clone.get().await, LightingOverride::Level(0));

        clone.set(LightingOverride::Auto).await;
        assert_eq!(control.get().await, LightingOverride::Auto);
    }
}
