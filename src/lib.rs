// In: src/lib.rs

//! Pokémon Matchmaker
//!
//! Picks the metagame and gimmick of each match for a betting stream. Modes
//! are loaded from RON documents, drawn by rarity under pairwise restrictions,
//! or built from a viewer's bid, and their match settings are merged into one
//! bundle with a bet bonus, team sizes and a battle timer.

// --- MODULE DECLARATIONS ---
// This declares the module hierarchy for the crate.
pub mod bid;
pub mod config;
pub mod cooldowns;
pub mod errors;
pub mod matchmaker;
pub mod mcp_interface;
pub mod modes;
pub mod rarities;
pub mod resolver;
pub mod restrictions;
pub mod rotation;
pub mod selection;
pub mod settings;

// --- PUBLIC API RE-EXPORTS ---
// This section defines the public-facing API of the `pokemon-matchmaker` crate,
// making it easy for users to import the most important types directly.

// --- From the `schema` crate ---
// Re-export the configuration documents and their shared enums.
pub use schema::{
    // Documents
    EventConfig,
    GimmickDefs,
    MatchmakerConfig,
    MetagameDefs,
    // Mode definitions
    CategoryKind,
    Family,
    ModeDef,
    // Settings
    RawSettings,
    SettingLiteral,
    SettingName,
};

// --- From this crate's modules (`src/`) ---

// Matchmaking entry points.
pub use matchmaker::{FinalSettings, MatchPlan, Matchmaker, Switching, DEFAULT_RETRIES};
pub use resolver::{BidRequest, ModeResolver};

// Runtime mode types.
pub use bid::{parse_bid, BattleTimer, ParsedBid};
pub use config::ConfigSet;
pub use cooldowns::CooldownTracker;
pub use modes::{MatchMode, Mode};
pub use settings::{MatchSettings, SettingValue};

// Crate-specific error and result types.
pub use errors::{
    ConfigError, ConfigResult, InvalidRequest, MatchmakerError, MatchmakerResult,
    ResolutionError, ResolutionResult, SettingsError, SettingsResult,
};
