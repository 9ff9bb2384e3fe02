use crate::matchmaker::RotationConfig;
use crate::settings::RawSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metagame ids active in an event, per definition kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMetagames {
    pub base: Vec<String>,
    pub versus_mixes: Vec<String>,
    pub random_mixes: Vec<String>,
}

/// Gimmick ids active in an event, per definition kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventGimmicks {
    pub base: Vec<String>,
    pub random_combos: Vec<String>,
}

/// Per-mode replacements applied before the registries are built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeOverride {
    pub rarity: Option<f64>,
    pub cooldown: Option<u32>,
    pub biddable: Option<bool>,
    pub disabled: Option<bool>,
    /// Replaces the named settings within each listed priority tier.
    pub match_settings: RawSettings,
    /// Replaces individual entries of a metagame's `gimmick_rarities`.
    pub gimmick_rarities: BTreeMap<String, f64>,
}

/// Event-specific replacements for the top-level matchmaker settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventOverrides {
    pub default_metagame: Option<String>,
    pub default_gimmick: Option<String>,
    pub default_gimmick_chance: Option<f64>,
    pub max_metagames: Option<usize>,
    pub max_gimmicks: Option<usize>,
    pub must_contain_all_gimmicks: Option<Vec<String>>,
    pub must_contain_any_gimmicks: Option<Vec<String>>,
    pub equalize_rarities: Option<bool>,
    pub team_size_soft_limit: Option<u8>,
    pub uneven_teams_cooldown: Option<u32>,
    pub large_teams_cooldown: Option<u32>,
    pub rotations: Option<RotationConfig>,
    pub modes: BTreeMap<String, ModeOverride>,
    /// Extra tiers merged into the `default` mergeable bundle.
    pub default_settings: RawSettings,
}

/// Contents of `events/<id>.ron`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    pub metagames: EventMetagames,
    pub gimmicks: EventGimmicks,
    pub overrides: EventOverrides,
}
