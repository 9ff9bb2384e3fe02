// Pokemon Matchmaker Schema - Declarative configuration types
// This crate contains the serde shapes of the RON configuration files read by
// the pokemon-matchmaker crate: mode definitions, event documents, restriction
// lists and the setting names every mode may override.

// Re-export the main types
pub use event::*;
pub use matchmaker::*;
pub use modes::*;
pub use restrictions::*;
pub use settings::*;

pub mod event;
pub mod matchmaker;
pub mod modes;
pub mod restrictions;
pub mod settings;

/// Id of the gimmick that stands for "no gimmick". Its rarity is always derived.
pub const NORMAL_GIMMICK: &str = "normal";
