//! Must-contain gimmick expansion.
//!
//! When an event requires some gimmicks in every match, each other base
//! gimmick is disabled for automated draws and replaced by ordinary composite
//! entries that carry the required gimmicks along. The pass runs once, on
//! plain definitions, before any registry is built.

use crate::errors::{ConfigError, ConfigResult};
use crate::modes::mode::{DefKind, ModeEntry};
use schema::{ModeDef, NORMAL_GIMMICK};
use std::collections::BTreeMap;

/// Most components a random combo may have after the required gimmicks are prepended.
pub const MAX_COMBO_COMPONENTS: usize = 4;

const GENERATED_SUFFIX: &str = "_autogenerated";

/// The required gimmicks of an event, restricted to active base gimmicks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MustContain {
    pub all: Vec<String>,
    pub any: Vec<String>,
    permutations: Vec<Vec<String>>,
}

impl MustContain {
    pub fn new<F>(all: &[String], any: &[String], is_active_base: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let all: Vec<String> = all.iter().filter(|id| is_active_base(id)).cloned().collect();
        let any: Vec<String> = any.iter().filter(|id| is_active_base(id)).cloned().collect();

        let permutations = if !any.is_empty() {
            any.iter()
                .map(|extra| {
                    let mut permutation = all.clone();
                    permutation.push(extra.clone());
                    permutation
                })
                .collect()
        } else if !all.is_empty() {
            vec![all.clone()]
        } else {
            Vec::new()
        };

        Self {
            all,
            any,
            permutations,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.permutations.is_empty()
    }

    /// Every set of gimmicks a match must contain one of.
    pub fn permutations(&self) -> &[Vec<String>] {
        &self.permutations
    }

    /// Whether `id` alone already satisfies one of the permutations.
    pub fn satisfies_alone(&self, id: &str) -> bool {
        self.permutations
            .iter()
            .any(|permutation| permutation.len() == 1 && permutation[0] == id)
    }

    /// Whether the permutations themselves need composite entries.
    fn needs_permutation_composites(&self) -> bool {
        !self.all.is_empty()
            && self
                .permutations
                .first()
                .is_some_and(|permutation| permutation.len() > 1)
    }

    /// Ids of the entries generated from `id`, one per permutation. Empty when
    /// `id` is left alone.
    pub fn replacements_for(&self, id: &str) -> Vec<String> {
        if id == NORMAL_GIMMICK || self.satisfies_alone(id) {
            return Vec::new();
        }
        self.permutations
            .iter()
            .map(|permutation| generated_id(Some(id), permutation))
            .collect()
    }
}

/// `"<prefix>+<a>+<b>_autogenerated"`, or `"<a>+<b>_autogenerated"` without a prefix.
pub fn generated_id(prefix: Option<&str>, permutation: &[String]) -> String {
    let joined = permutation.join("+");
    match prefix {
        Some(prefix) => format!("{}+{}{}", prefix, joined, GENERATED_SUFFIX),
        None => format!("{}{}", joined, GENERATED_SUFFIX),
    }
}

fn generated_combo(rarity: f64, sub_modes: Vec<String>, sub_rarities: &BTreeMap<String, f64>) -> ModeDef {
    ModeDef {
        display_name: Some("Combo".to_string()),
        description: Some(String::new()),
        icon_id: Some("combo".to_string()),
        rarity: Some(rarity),
        sub_modes: Some(sub_modes),
        sub_mode_rarities: sub_rarities.clone(),
        ..Default::default()
    }
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

/// Result of expanding the gimmick definitions.
#[derive(Debug, Clone, Default)]
pub struct ExpandedGimmicks {
    pub entries: Vec<ModeEntry>,
    /// Entries that share the rarity the normal gimmick gives up.
    pub rarity_adjusted: Vec<String>,
}

/// Expands base gimmicks and random combos for the required gimmicks.
///
/// `default_sub_rarities` holds the configured rarity of every active
/// non-normal base gimmick and fills the sub rarities of generated entries.
pub fn expand_gimmicks(
    entries: Vec<ModeEntry>,
    must_contain: &MustContain,
    default_sub_rarities: &BTreeMap<String, f64>,
) -> ConfigResult<ExpandedGimmicks> {
    if !must_contain.is_active() {
        return Ok(ExpandedGimmicks {
            entries,
            rarity_adjusted: Vec::new(),
        });
    }

    let mut bases = Vec::new();
    let mut combos = Vec::new();
    let mut rarity_adjusted = Vec::new();

    for mut entry in entries {
        match entry.kind {
            DefKind::BaseGimmick if entry.id == NORMAL_GIMMICK => bases.push(entry),
            DefKind::BaseGimmick if must_contain.satisfies_alone(&entry.id) => {
                rarity_adjusted.push(entry.id.clone());
                bases.push(entry);
            }
            DefKind::BaseGimmick => {
                let rarity = entry.def.rarity.unwrap_or(0.0);
                entry.def.rarity = Some(0.0);
                for permutation in must_contain.permutations() {
                    let mut sub_modes = vec![entry.id.clone()];
                    sub_modes.extend(permutation.iter().cloned());
                    combos.push(ModeEntry {
                        id: generated_id(Some(&entry.id), permutation),
                        kind: DefKind::RandomCombo,
                        def: generated_combo(
                            rarity,
                            dedup_preserving_order(sub_modes),
                            default_sub_rarities,
                        ),
                    });
                }
                bases.push(entry);
            }
            DefKind::RandomCombo => {
                for permutation in must_contain.permutations() {
                    let mut def = entry.def.clone();
                    let existing = def.sub_modes.take().unwrap_or_default();
                    let mut sub_modes: Vec<String> = permutation
                        .iter()
                        .filter(|id| !existing.contains(*id))
                        .cloned()
                        .collect();
                    sub_modes.extend(existing);
                    if sub_modes.len() > MAX_COMBO_COMPONENTS {
                        return Err(ConfigError::TooManyComponents {
                            id: entry.id.clone(),
                            count: sub_modes.len(),
                            max: MAX_COMBO_COMPONENTS,
                        });
                    }
                    if def.sub_mode_rarities.is_empty() {
                        def.sub_mode_rarities = default_sub_rarities.clone();
                    }
                    def.sub_modes = Some(sub_modes);
                    combos.push(ModeEntry {
                        id: generated_id(Some(&entry.id), permutation),
                        kind: DefKind::RandomCombo,
                        def,
                    });
                }
            }
            _ => bases.push(entry),
        }
    }

    if must_contain.needs_permutation_composites() {
        for permutation in must_contain.permutations() {
            let id = generated_id(None, permutation);
            combos.push(ModeEntry {
                id: id.clone(),
                kind: DefKind::RandomCombo,
                def: generated_combo(1.0, permutation.clone(), default_sub_rarities),
            });
            rarity_adjusted.push(id);
        }
    }

    bases.extend(combos);
    Ok(ExpandedGimmicks {
        entries: bases,
        rarity_adjusted,
    })
}

/// Points a metagame's gimmick rarity overrides and whitelist at the
/// generated ids.
pub fn rewrite_metagame_gimmick_ids(def: &mut ModeDef, must_contain: &MustContain) {
    if !must_contain.is_active() {
        return;
    }

    let mut whitelist = Vec::with_capacity(def.gimmick_rarity_whitelist.len());
    let mut appended = Vec::new();
    for id in def.gimmick_rarity_whitelist.drain(..) {
        let replacements = must_contain.replacements_for(&id);
        if replacements.is_empty() {
            whitelist.push(id);
        } else {
            appended.extend(replacements);
        }
    }
    whitelist.extend(appended);
    def.gimmick_rarity_whitelist = whitelist;

    let rarities = std::mem::take(&mut def.gimmick_rarities);
    for (id, rarity) in rarities {
        let replacements = must_contain.replacements_for(&id);
        if replacements.is_empty() {
            def.gimmick_rarities.insert(id, rarity);
        } else {
            for replacement in replacements {
                def.gimmick_rarities.insert(replacement, rarity);
            }
        }
    }
}

/// Derives the normal gimmick's rarity from `default_gimmick_chance`.
///
/// With the expansion active, the normal gimmick never rolls and its share is
/// split evenly over `rarity_adjusted`.
pub fn derive_normal_rarity(
    entries: &mut [ModeEntry],
    chance: f64,
    rarity_adjusted: &[String],
    expansion_active: bool,
) -> ConfigResult<()> {
    if !entries.iter().any(|entry| entry.id == NORMAL_GIMMICK) {
        return Err(ConfigError::MissingNormalGimmick);
    }
    if !(0.0..=1.0).contains(&chance) {
        return Err(ConfigError::InvalidGimmickChance(chance));
    }

    let set_normal = |entries: &mut [ModeEntry], rarity: f64| {
        for entry in entries.iter_mut().filter(|entry| entry.id == NORMAL_GIMMICK) {
            entry.def.rarity = Some(rarity);
        }
    };

    if chance == 0.0 {
        for entry in entries.iter_mut() {
            entry.def.rarity = Some(0.0);
        }
        set_normal(entries, 1.0);
        return Ok(());
    }
    if chance == 1.0 {
        set_normal(entries, 0.0);
        return Ok(());
    }

    let sum: f64 = entries
        .iter()
        .filter(|entry| entry.id != NORMAL_GIMMICK)
        .map(|entry| entry.def.rarity.unwrap_or(0.0))
        .sum();
    let normal_rarity = sum / chance - sum;

    if !expansion_active {
        set_normal(entries, normal_rarity);
        return Ok(());
    }

    set_normal(entries, 0.0);
    if rarity_adjusted.is_empty() {
        return Ok(());
    }
    let share = normal_rarity / rarity_adjusted.len() as f64;
    for entry in entries
        .iter_mut()
        .filter(|entry| rarity_adjusted.contains(&entry.id))
    {
        entry.def.rarity = Some(share);
    }
    Ok(())
}
