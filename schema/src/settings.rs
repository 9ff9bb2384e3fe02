use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Every match setting a mode may override.
///
/// The names are matched against configuration keys in `snake_case`; a key that
/// does not parse into one of these variants is rejected when the config loads.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SettingName {
    RegularDelay,
    SwitchOnlyDelay,
    BetBonus,
    SwitchingBetBonus,
    BetCeiling,
    InputlessRandomSwitchChance,
    AnimationSpeedMultiplier,
    TurnsExpectedMax,
    Switching,
    CheckCancerRecommendation,
    BetBonusHasDecay,
    AlwaysAllowSelfTarget,
    TeamSizes,
    Pbr,
    AllyHit,
    BattleTimer,
    Effectiveness,
}

/// A raw setting value as written in configuration, before it is decoded
/// against the shape its setting name expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingLiteral {
    Bool(bool),
    Number(f64),
    Text(String),
    Table(BTreeMap<String, SettingLiteral>),
}

impl SettingLiteral {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SettingLiteral::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingLiteral::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SettingLiteral::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Settings overrides grouped by priority tier, then by setting name.
pub type RawSettings = BTreeMap<i32, BTreeMap<String, SettingLiteral>>;
