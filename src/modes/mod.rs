pub mod categories;
pub mod collection;
pub mod expansion;
pub mod match_mode;
pub mod mode;
pub mod prepare;

pub use categories::{Categories, Category, PoolCategory};
pub use collection::{validate_registries, ModeCollection};
pub use expansion::MustContain;
pub use match_mode::{
    stringify_list, GimmickDetails, GimmickRequest, MatchDetails, MatchMode, MetagameDetails,
};
pub use mode::{Component, CompositeKind, Composition, DefKind, Mode, ModeEntry, ModeInfo};
pub use prepare::{prepare_modes, PreparedModes};
