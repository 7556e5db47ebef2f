pub mod logger;
pub mod resolver;

pub use logger::{PresenceLogger, TagTransitions};
pub use resolver::{
    aggregate, PreferenceAverages, PresenceResolver, PresenceSummary, PresentOccupant,
    DEFAULT_LUMINOSITY, DEFAULT_TEMPERATURE,
};

/// Round to one decimal place (`21.16 → 21.2`).
pub fn round_one_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
