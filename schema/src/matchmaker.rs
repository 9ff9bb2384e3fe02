use crate::restrictions::RestrictionsConfig;
use crate::settings::RawSettings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Named settings bundles merged in at specific points of match creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeableSettings {
    /// Base layer for every match.
    pub default: RawSettings,
    /// Merged on top when a bid names both rosters.
    pub team_choice: RawSettings,
    /// Merged on top when switching is off and every Pokémon knows one move.
    pub one_move_per_pokemon: RawSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub enabled: bool,
    pub gimmick_chance: f64,
    pub gimmicks_per_rotation: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gimmick_chance: 0.5,
            gimmicks_per_rotation: 3,
        }
    }
}

/// Bet bonus ceilings for bids that request more than one mode per family
/// without naming rosters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiModeCeilings {
    pub default: f64,
    /// Base ids that do not count towards the mode total.
    pub ignore: BTreeSet<String>,
    /// Gimmicks whose presence lifts the ceiling entirely.
    pub full_exemptions: BTreeSet<String>,
    /// Gimmick that unlocks the per-metagame ceilings below.
    pub subset_exemption_gimmick: Option<String>,
    /// Per-metagame ceilings applied when every base metagame is listed here.
    pub defiance_subset_exemptions: BTreeMap<String, f64>,
}

/// Which teams have to break a [`TeamSizeRule`] limit for the rule to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamScope {
    #[default]
    Any,
    All,
}

impl TeamScope {
    pub fn holds(self, blue: bool, red: bool) -> bool {
        match self {
            TeamScope::Any => blue || red,
            TeamScope::All => blue && red,
        }
    }
}

/// Forbids a set of gimmicks below a minimum or above a maximum team size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamSizeRule {
    pub gimmicks: Vec<String>,
    pub min_size: Option<u8>,
    pub max_size: Option<u8>,
    pub applies_to: TeamScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BidRules {
    /// Gimmicks that must all be present when a bid sets an ally hit chance.
    pub ally_hit_requires: Vec<String>,
    pub team_size_rules: Vec<TeamSizeRule>,
    /// Gimmick token appended to a bid that sets a battle timer.
    pub battle_timer_mode: String,
}

impl Default for BidRules {
    fn default() -> Self {
        Self {
            ally_hit_requires: Vec::new(),
            team_size_rules: Vec::new(),
            battle_timer_mode: "timed".to_string(),
        }
    }
}

/// Contents of `settings.ron`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakerConfig {
    pub default_metagame: String,
    pub default_gimmick: String,
    pub default_gimmick_chance: f64,
    pub max_metagames: usize,
    pub max_gimmicks: usize,
    pub must_contain_all_gimmicks: Vec<String>,
    pub must_contain_any_gimmicks: Vec<String>,
    /// Debug switch: every non-zero rarity becomes 1.
    pub equalize_rarities: bool,
    pub restrictions: RestrictionsConfig,
    pub mergeable: MergeableSettings,
    pub rotations: RotationConfig,
    pub team_size_soft_limit: u8,
    pub uneven_teams_cooldown: u32,
    pub large_teams_cooldown: u32,
    pub multi_mode_ceilings: MultiModeCeilings,
    pub bid_rules: BidRules,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            default_metagame: "default".to_string(),
            default_gimmick: crate::NORMAL_GIMMICK.to_string(),
            default_gimmick_chance: 0.5,
            max_metagames: 2,
            max_gimmicks: 5,
            must_contain_all_gimmicks: Vec::new(),
            must_contain_any_gimmicks: Vec::new(),
            equalize_rarities: false,
            restrictions: RestrictionsConfig::default(),
            mergeable: MergeableSettings::default(),
            rotations: RotationConfig::default(),
            team_size_soft_limit: 3,
            uneven_teams_cooldown: 0,
            large_teams_cooldown: 0,
            multi_mode_ceilings: MultiModeCeilings::default(),
            bid_rules: BidRules::default(),
        }
    }
}
