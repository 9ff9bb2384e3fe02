use schema::{CategoryKind, Family, SettingName};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the matchmaker
#[derive(Debug, Error)]
pub enum MatchmakerError {
    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Settings could not be decoded or merged
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    /// A bid was rejected; the message is meant for the bidder
    #[error("{0}")]
    InvalidRequest(#[from] InvalidRequest),
    /// Automated resolution failed; the caller may retry
    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),
}

impl MatchmakerError {
    /// Whether the automated path may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MatchmakerError::Resolution(_) | MatchmakerError::Settings(_)
        )
    }
}

/// Fatal errors raised while loading configuration and building registries
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("Duplicate mode id: {0}")]
    DuplicateId(String),
    #[error("Duplicate mode alias for id {id}: {alias}")]
    DuplicateAlias { id: String, alias: String },
    #[error("Duplicate mode emoji {emoji} for ids {first} and {second}")]
    DuplicateEmoji {
        emoji: String,
        first: String,
        second: String,
    },
    #[error("Mode {id} must have {field}")]
    MissingField { id: String, field: &'static str },
    #[error("Base mode {0} must not have sub modes")]
    BaseWithSubModes(String),
    #[error("Composite mode {0} must have at least one sub mode")]
    CompositeWithoutSubModes(String),
    #[error("Composite mode {composite} references {component}, which is not an active base mode")]
    DanglingComponent { composite: String, component: String },
    #[error("Wildcard sub modes are only supported for gimmicks (found in {0})")]
    UnsupportedWildcard(String),
    #[error("The default {family} `{id}` is not present in this event, or does not exist")]
    MissingDefault { family: Family, id: String },
    #[error("The `{}` gimmick must be present in every event", schema::NORMAL_GIMMICK)]
    MissingNormalGimmick,
    #[error("default_gimmick_chance must be between 0 and 1, inclusive (got {0})")]
    InvalidGimmickChance(f64),
    #[error("Rarity cannot be assigned to the normal gimmick. Set default_gimmick_chance instead")]
    NormalGimmickRarity,
    #[error("Mode {id} has a negative rarity ({rarity})")]
    NegativeRarity { id: String, rarity: f64 },
    #[error("After adding the must-contain gimmicks, {id} has too many modes ({count} > {max})")]
    TooManyComponents { id: String, count: usize, max: usize },
    #[error("Gimmick {id} has an invalid {kind} category: {reason}")]
    InvalidCategory {
        id: String,
        kind: CategoryKind,
        reason: String,
    },
    #[error("Invalid match settings for {owner}: {source}")]
    Settings {
        owner: String,
        #[source]
        source: SettingsError,
    },
}

/// Errors raised while decoding or merging settings bundles
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("Did not recognize setting {0}")]
    UnknownSetting(String),
    #[error("Setting {name} expects {expected}, got {found}")]
    InvalidLiteral {
        name: SettingName,
        expected: &'static str,
        found: String,
    },
    #[error("Invalid team size key `{0}`, expected a form like 3v3")]
    InvalidTeamSizeKey(String),
    #[error("Multiple values within a priority tier are not supported for {0}")]
    MultipleContributors(SettingName),
    #[error("No valid team sizes available")]
    NoTeamSizes,
}

/// Bid-path errors. Messages name bid aliases, never raw ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("Your bid appears to be formatted incorrectly. Type \"match help\" to view the expected format.")]
    Malformed,
    #[error("{0} is not a recognized mode name.")]
    ModeNotExisting(String),
    #[error("{0} is ineligible for match bidding.")]
    IneligibleMode(String),
    #[error("{alias} is on cooldown for {remaining} more token matches.")]
    CoolingDown { alias: String, remaining: u32 },
    #[error("{0} may not be combined with {1}.")]
    ModesConflict(String, String),
    #[error("You may not choose teams when requesting {0} mode.")]
    TeamChoiceRestriction(String),
    #[error("Clone Pokémon found in modes, but Clone was not requested.")]
    SpeciesWithoutClone,
    #[error("{0} may not be cloned.")]
    NotCloneable(String),
    #[error("When choosing the cloned Pokemon, you may choose at most {0} other gimmick(s).")]
    TooManyCloneCompanions(usize),
    #[error("When choosing the cloned Pokemon, clone may not be combined with {0}.")]
    CloneConflict(String),
    #[error("Switching is not permitted with those modes.")]
    SwitchingNotPermitted,
    #[error("You may request at most {max} {family}s.")]
    TooManyModes { family: Family, max: usize },
    #[error("{alias} may not be combined with other {family}s.")]
    CompositeNotAlone { alias: String, family: Family },
    #[error("{0} can only be requested by naming the modes it should contain.")]
    WildcardComposite(String),
    #[error("Those {0}s may not be combined.")]
    CannotCombine(Family),
    #[error("Match must include all of these gimmicks: {0}.")]
    MustContainAll(String),
    #[error("Match must include at least one of these gimmicks: {0}.")]
    MustContainAny(String),
    #[error("Ally target % must be accompanied by {0}.")]
    AllyHitRequires(String),
    #[error("Ally target percentage must be between 0 and 100 (got {0}%)")]
    AllyHitOutOfRange(u32),
    #[error("Battle timer must be \"random\" or between 1 and 15 minutes (got {0})")]
    BattleTimerOutOfRange(u32),
    #[error("The team sizes specified in your bid do not match.")]
    TeamSizeMismatch,
    #[error("Invalid team size")]
    InvalidTeamSize,
    #[error("{alias} may not be requested for a match where {scope} has {comparison} {limit} Pokemon.")]
    TeamSizeForbidden {
        alias: String,
        scope: &'static str,
        comparison: &'static str,
        limit: u8,
    },
    #[error("{species} may not be cloned for a match where a team has more than {limit} Pokemon.")]
    CloneTeamSizeForbidden { species: String, limit: u8 },
    #[error("Matches with uneven teams are on cooldown for {0} more token matches.")]
    UnevenTeamsCooling(u32),
    #[error("Matches with more than {limit} Pokemon per team are on cooldown for {remaining} more token matches.")]
    LargeTeamsCooling { limit: u8, remaining: u32 },
}

/// Automated-path failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("No valid {family}s available ({context})")]
    NoEligibleMode { family: Family, context: String },
    #[error("Primary {family} {primary} specifies {component}, which is forbidden")]
    ForbiddenComponent {
        family: Family,
        primary: String,
        component: String,
    },
    #[error("Composite mode {primary} had fewer than 2 usable components ({available:?})")]
    TooFewComponents {
        primary: String,
        available: Vec<String>,
    },
    #[error("{0} may not be combined with {1}")]
    Conflict(String, String),
    #[error("Mode {0} was selected, but it is not present in the event")]
    UnknownMode(String),
    #[error("Invalid match mode. Primary id: {primary}, base ids: {base_ids:?}")]
    InvalidMatchMode {
        primary: String,
        base_ids: Vec<String>,
    },
    #[error("Cannot merge {0} categories")]
    CategoryMerge(CategoryKind),
    #[error("{0}")]
    Settings(#[from] SettingsError),
}

/// Type alias for Results using MatchmakerError
pub type MatchmakerResult<T> = Result<T, MatchmakerError>;

/// Type alias for Results using ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Type alias for Results using SettingsError
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Type alias for Results using ResolutionError
pub type ResolutionResult<T> = Result<T, ResolutionError>;
