//! Typed match settings and the merge algebra that combines the overrides of
//! several modes into one bundle.
//!
//! Each bundle maps a setting name to a value and the priority tier it was
//! declared in. Merging keeps, per name, the values from the highest tier and
//! reduces ties with a rule fixed per setting name (see [`merge_rule`]).

use crate::bid::{BattleTimer, ALLY_HIT_MAX, BATTLE_TIMER_MINUTES};
use crate::errors::{SettingsError, SettingsResult};
use ordered_float::OrderedFloat;
use rand::seq::IndexedRandom;
use rand::Rng;
use schema::{RawSettings, SettingLiteral, SettingName};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Value of the `switching` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchingSetting {
    /// Probability that switching is turned on.
    Chance(OrderedFloat<f64>),
    Special,
    PermanentlyDisabled,
}

/// Availability of one team size pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TeamSizeEntry {
    pub rarity: OrderedFloat<f64>,
    pub biddable: bool,
}

pub type TeamSizeTable = BTreeMap<(u8, u8), TeamSizeEntry>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    Number(OrderedFloat<f64>),
    Bool(bool),
    Text(String),
    Switching(SwitchingSetting),
    #[serde(serialize_with = "serialize_team_sizes")]
    TeamSizes(TeamSizeTable),
    /// Weighted table of choices, keyed by the choice as written in config.
    Weighted(BTreeMap<String, OrderedFloat<f64>>),
}

impl SettingValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SettingValue::Number(n) => Some(n.into_inner()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

fn serialize_team_sizes<S>(sizes: &TeamSizeTable, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(sizes.len()))?;
    for ((a, b), entry) in sizes {
        map.serialize_entry(&format!("{}v{}", a, b), entry)?;
    }
    map.end()
}

/// A setting value together with the tier it was declared in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub value: SettingValue,
    pub priority: i32,
}

/// How same-tier values of one setting are reduced to a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    Minimum,
    Maximum,
    AnyTrue,
    SwitchingOrder,
    TeamSizes,
    RandomChoice,
    Unique,
}

/// The merge rule for every setting name. New names must be given a rule here.
pub fn merge_rule(name: SettingName) -> MergeRule {
    match name {
        SettingName::RegularDelay
        | SettingName::SwitchOnlyDelay
        | SettingName::BetBonus
        | SettingName::SwitchingBetBonus
        | SettingName::BetCeiling
        | SettingName::InputlessRandomSwitchChance => MergeRule::Minimum,
        SettingName::AnimationSpeedMultiplier | SettingName::TurnsExpectedMax => MergeRule::Maximum,
        SettingName::CheckCancerRecommendation
        | SettingName::BetBonusHasDecay
        | SettingName::AlwaysAllowSelfTarget => MergeRule::AnyTrue,
        SettingName::Switching => MergeRule::SwitchingOrder,
        SettingName::TeamSizes => MergeRule::TeamSizes,
        SettingName::Pbr | SettingName::AllyHit | SettingName::BattleTimer => {
            MergeRule::RandomChoice
        }
        SettingName::Effectiveness => MergeRule::Unique,
    }
}

/// An immutable bundle of settings overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MatchSettings {
    settings: BTreeMap<SettingName, Setting>,
}

impl MatchSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a `{priority: {name: literal}}` table. When a name appears in
    /// several tiers the highest tier is kept.
    pub fn from_config(raw: &RawSettings) -> SettingsResult<Self> {
        let mut settings = BTreeMap::new();
        for (&priority, entries) in raw {
            for (key, literal) in entries {
                let name = SettingName::from_str(key)
                    .map_err(|_| SettingsError::UnknownSetting(key.clone()))?;
                let value = decode(name, literal)?;
                settings.insert(name, Setting { value, priority });
            }
        }
        Ok(Self { settings })
    }

    pub fn get(&self, name: SettingName) -> Option<&Setting> {
        self.settings.get(&name)
    }

    pub fn value(&self, name: SettingName) -> Option<&SettingValue> {
        self.settings.get(&name).map(|s| &s.value)
    }

    pub fn number(&self, name: SettingName) -> Option<f64> {
        self.value(name).and_then(SettingValue::as_number)
    }

    pub fn flag(&self, name: SettingName) -> Option<bool> {
        self.value(name).and_then(SettingValue::as_bool)
    }

    pub fn team_sizes(&self) -> Option<&TeamSizeTable> {
        match self.value(SettingName::TeamSizes) {
            Some(SettingValue::TeamSizes(sizes)) => Some(sizes),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SettingName, &Setting)> {
        self.settings.iter().map(|(name, setting)| (*name, setting))
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Merges bundles. For each name the highest priority tier wins and ties
    /// inside that tier are reduced with [`merge_rule`]. The random-choice
    /// settings draw from `rng`.
    pub fn merge<R: Rng + ?Sized>(bundles: &[&MatchSettings], rng: &mut R) -> SettingsResult<Self> {
        let mut grouped: BTreeMap<SettingName, Vec<&Setting>> = BTreeMap::new();
        for bundle in bundles {
            for (name, setting) in &bundle.settings {
                grouped.entry(*name).or_default().push(setting);
            }
        }

        let mut settings = BTreeMap::new();
        for (name, contributors) in grouped {
            let Some(priority) = contributors.iter().map(|s| s.priority).max() else {
                continue;
            };
            let top: Vec<&SettingValue> = contributors
                .iter()
                .filter(|s| s.priority == priority)
                .map(|s| &s.value)
                .collect();
            let value = reduce(name, &top, rng)?;
            settings.insert(name, Setting { value, priority });
        }
        Ok(Self { settings })
    }
}

fn reduce<R: Rng + ?Sized>(
    name: SettingName,
    values: &[&SettingValue],
    rng: &mut R,
) -> SettingsResult<SettingValue> {
    let mismatch = |found: &SettingValue| SettingsError::InvalidLiteral {
        name,
        expected: expected_shape(name),
        found: format!("{:?}", found),
    };

    match merge_rule(name) {
        MergeRule::Minimum | MergeRule::Maximum => {
            let mut numbers = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    SettingValue::Number(n) => numbers.push(*n),
                    other => return Err(mismatch(other)),
                }
            }
            let picked = if merge_rule(name) == MergeRule::Minimum {
                numbers.into_iter().min()
            } else {
                numbers.into_iter().max()
            };
            picked
                .map(SettingValue::Number)
                .ok_or_else(|| SettingsError::InvalidLiteral {
                    name,
                    expected: expected_shape(name),
                    found: "nothing".to_string(),
                })
        }
        MergeRule::AnyTrue => {
            let mut any = false;
            for value in values {
                match value {
                    SettingValue::Bool(b) => any |= *b,
                    other => return Err(mismatch(other)),
                }
            }
            Ok(SettingValue::Bool(any))
        }
        MergeRule::SwitchingOrder => {
            let mut result: Option<SwitchingSetting> = None;
            for value in values {
                let SettingValue::Switching(switching) = value else {
                    return Err(mismatch(value));
                };
                result = Some(match (result, *switching) {
                    (None, s) => s,
                    (Some(SwitchingSetting::PermanentlyDisabled), _)
                    | (_, SwitchingSetting::PermanentlyDisabled) => SwitchingSetting::PermanentlyDisabled,
                    (Some(SwitchingSetting::Special), _) | (_, SwitchingSetting::Special) => SwitchingSetting::Special,
                    (Some(SwitchingSetting::Chance(a)), SwitchingSetting::Chance(b)) => {
                        SwitchingSetting::Chance(a.min(b))
                    }
                });
            }
            result
                .map(SettingValue::Switching)
                .ok_or_else(|| mismatch(&SettingValue::Bool(false)))
        }
        MergeRule::TeamSizes => {
            let mut merged = TeamSizeTable::new();
            for value in values {
                let SettingValue::TeamSizes(sizes) = value else {
                    return Err(mismatch(value));
                };
                for (pair, entry) in sizes {
                    merged
                        .entry(*pair)
                        .and_modify(|current: &mut TeamSizeEntry| {
                            current.rarity = current.rarity.min(entry.rarity);
                            current.biddable &= entry.biddable;
                        })
                        .or_insert(*entry);
                }
            }
            if merged.is_empty() {
                return Err(SettingsError::NoTeamSizes);
            }
            let mirrored: Vec<((u8, u8), TeamSizeEntry)> = merged
                .iter()
                .filter(|((a, b), _)| !merged.contains_key(&(*b, *a)))
                .map(|((a, b), entry)| ((*b, *a), *entry))
                .collect();
            merged.extend(mirrored);
            Ok(SettingValue::TeamSizes(merged))
        }
        MergeRule::RandomChoice => values
            .choose(rng)
            .map(|v| (*v).clone())
            .ok_or_else(|| mismatch(&SettingValue::Bool(false))),
        MergeRule::Unique => match values {
            [single] => Ok((*single).clone()),
            _ => Err(SettingsError::MultipleContributors(name)),
        },
    }
}

fn expected_shape(name: SettingName) -> &'static str {
    match merge_rule(name) {
        MergeRule::Minimum | MergeRule::Maximum => "a number",
        MergeRule::AnyTrue => "a boolean",
        MergeRule::SwitchingOrder => "a chance or \"special\" / \"permanently_disabled\"",
        MergeRule::TeamSizes => "a table of \"NvM\" -> {rarity, biddable}",
        MergeRule::Unique => "a string",
        MergeRule::RandomChoice => match name {
            SettingName::AllyHit => "a percentage or a weighted table",
            SettingName::BattleTimer => "minutes, \"random\" or a weighted table",
            _ => "a scalar",
        },
    }
}

/// Decodes one configured literal into the shape its setting name expects.
fn decode(name: SettingName, literal: &SettingLiteral) -> SettingsResult<SettingValue> {
    let invalid = || SettingsError::InvalidLiteral {
        name,
        expected: expected_shape(name),
        found: format!("{:?}", literal),
    };

    match name {
        SettingName::RegularDelay
        | SettingName::SwitchOnlyDelay
        | SettingName::BetBonus
        | SettingName::SwitchingBetBonus
        | SettingName::BetCeiling
        | SettingName::InputlessRandomSwitchChance
        | SettingName::AnimationSpeedMultiplier
        | SettingName::TurnsExpectedMax => literal
            .as_number()
            .map(|n| SettingValue::Number(OrderedFloat(n)))
            .ok_or_else(invalid),
        SettingName::CheckCancerRecommendation
        | SettingName::BetBonusHasDecay
        | SettingName::AlwaysAllowSelfTarget => {
            literal.as_bool().map(SettingValue::Bool).ok_or_else(invalid)
        }
        SettingName::Switching => match literal {
            SettingLiteral::Number(n) => Ok(SettingValue::Switching(
                SwitchingSetting::Chance(OrderedFloat(*n)),
            )),
            SettingLiteral::Text(t) if t == "special" => {
                Ok(SettingValue::Switching(SwitchingSetting::Special))
            }
            SettingLiteral::Text(t) if t == "permanently_disabled" => Ok(SettingValue::Switching(
                SwitchingSetting::PermanentlyDisabled,
            )),
            _ => Err(invalid()),
        },
        SettingName::TeamSizes => {
            let SettingLiteral::Table(table) = literal else {
                return Err(invalid());
            };
            let mut sizes = TeamSizeTable::new();
            for (key, entry) in table {
                let pair = parse_team_size_key(key)?;
                let SettingLiteral::Table(fields) = entry else {
                    return Err(invalid());
                };
                let rarity = fields
                    .get("rarity")
                    .and_then(SettingLiteral::as_number)
                    .ok_or_else(invalid)?;
                let biddable = match fields.get("biddable") {
                    Some(flag) => flag.as_bool().ok_or_else(invalid)?,
                    None => true,
                };
                sizes.insert(
                    pair,
                    TeamSizeEntry {
                        rarity: OrderedFloat(rarity),
                        biddable,
                    },
                );
            }
            Ok(SettingValue::TeamSizes(sizes))
        }
        SettingName::Pbr => match literal {
            SettingLiteral::Bool(b) => Ok(SettingValue::Bool(*b)),
            SettingLiteral::Number(n) => Ok(SettingValue::Number(OrderedFloat(*n))),
            SettingLiteral::Text(t) => Ok(SettingValue::Text(t.clone())),
            SettingLiteral::Table(_) => Err(invalid()),
        },
        SettingName::AllyHit => match literal {
            SettingLiteral::Number(n) if ally_hit_percent(*n).is_some() => {
                Ok(SettingValue::Number(OrderedFloat(*n)))
            }
            SettingLiteral::Table(table) if table.keys().all(|k| ally_hit_choice(k).is_some()) => {
                decode_weighted(table).ok_or_else(invalid)
            }
            _ => Err(invalid()),
        },
        SettingName::BattleTimer => match literal {
            SettingLiteral::Number(n) if battle_timer_minutes(*n).is_some() => {
                Ok(SettingValue::Number(OrderedFloat(*n)))
            }
            SettingLiteral::Text(t) if t == "random" => Ok(SettingValue::Text(t.clone())),
            SettingLiteral::Table(table)
                if table.keys().all(|k| battle_timer_choice(k).is_some()) =>
            {
                decode_weighted(table).ok_or_else(invalid)
            }
            _ => Err(invalid()),
        },
        SettingName::Effectiveness => literal
            .as_text()
            .map(|t| SettingValue::Text(t.to_string()))
            .ok_or_else(invalid),
    }
}

fn decode_weighted(table: &BTreeMap<String, SettingLiteral>) -> Option<SettingValue> {
    let mut weights = BTreeMap::new();
    for (choice, weight) in table {
        weights.insert(choice.clone(), OrderedFloat(weight.as_number()?));
    }
    Some(SettingValue::Weighted(weights))
}

fn whole_number(value: f64) -> Option<u32> {
    (value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value)).then_some(value as u32)
}

/// A configured ally hit chance as a whole percentage.
pub fn ally_hit_percent(value: f64) -> Option<u32> {
    whole_number(value).filter(|percent| *percent <= ALLY_HIT_MAX)
}

/// A configured battle timer as whole minutes.
pub fn battle_timer_minutes(value: f64) -> Option<u32> {
    whole_number(value).filter(|minutes| BATTLE_TIMER_MINUTES.contains(minutes))
}

/// A key of a weighted `ally_hit` table, such as `25` or `25%`.
pub fn ally_hit_choice(key: &str) -> Option<u32> {
    key.trim_end_matches('%')
        .parse()
        .ok()
        .filter(|percent| *percent <= ALLY_HIT_MAX)
}

/// A key of a weighted `battle_timer` table: minutes or `random`.
pub fn battle_timer_choice(key: &str) -> Option<BattleTimer> {
    if key == "random" {
        return Some(BattleTimer::Random);
    }
    key.parse()
        .ok()
        .filter(|minutes| BATTLE_TIMER_MINUTES.contains(minutes))
        .map(BattleTimer::Minutes)
}

/// Parses a team size key such as `3v3` or `1v2`.
pub fn parse_team_size_key(key: &str) -> SettingsResult<(u8, u8)> {
    let invalid = || SettingsError::InvalidTeamSizeKey(key.to_string());
    let (left, right) = key.split_once(|c| c == 'v' || c == 'V').ok_or_else(invalid)?;
    let left: u8 = left.trim().parse().map_err(|_| invalid())?;
    let right: u8 = right.trim().parse().map_err(|_| invalid())?;
    Ok((left, right))
}
