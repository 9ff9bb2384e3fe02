//! Weighted selection tables derived from the registries and restrictions.

use crate::errors::{ResolutionError, ResolutionResult};
use crate::modes::{Mode, ModeCollection};
use crate::restrictions::RestrictionGraph;
use crate::selection::weighted_select;
use rand::Rng;
use schema::{Family, NORMAL_GIMMICK};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Mode id to non-negative weight, in registry order. Zero means "never
/// selected", not "invalid".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RarityTable {
    entries: Vec<(String, f64)>,
}

impl RarityTable {
    pub fn from_collection(collection: &ModeCollection) -> Self {
        Self {
            entries: collection
                .all()
                .iter()
                .map(|mode| (mode.id().to_string(), mode.rarity()))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, rarity)| *rarity)
    }

    /// Sets the weight of `id`, appending it when absent.
    pub fn insert(&mut self, id: &str, rarity: f64) {
        match self.entries.iter_mut().find(|(entry_id, _)| entry_id == id) {
            Some((_, existing)) => *existing = rarity,
            None => self.entries.push((id.to_string(), rarity)),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn zero(&mut self, id: &str) {
        if let Some((_, rarity)) = self.entries.iter_mut().find(|(entry_id, _)| entry_id == id) {
            *rarity = 0.0;
        }
    }

    pub fn zero_where<F: Fn(&str) -> bool>(&mut self, predicate: F) {
        for (id, rarity) in self.entries.iter_mut() {
            if predicate(id) {
                *rarity = 0.0;
            }
        }
    }

    pub fn retain<F: Fn(&str) -> bool>(&mut self, predicate: F) {
        self.entries.retain(|(id, _)| predicate(id));
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, rarity)| rarity.max(0.0)).sum()
    }

    /// Weighted draw. `None` when every weight is zero.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        weighted_select(&self.entries, rng).map(String::as_str)
    }
}

impl FromIterator<(String, f64)> for RarityTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// What is already known about the match when a mode is drawn.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawContext<'a> {
    /// Restricts the draw to these ids when set.
    pub eligible: Option<&'a [&'a str]>,
    pub metagame_primary: Option<&'a str>,
    pub metagame_bases: &'a [&'a str],
    pub gimmick_primary: Option<&'a str>,
    pub gimmick_bases: &'a [&'a str],
    pub forbidden: &'a [&'a str],
}

/// The four derived tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeRarities {
    default_metagame: RarityTable,
    default_gimmick: RarityTable,
    gimmick_by_metagame: BTreeMap<String, RarityTable>,
    metagame_by_gimmick: BTreeMap<String, RarityTable>,
    optional_sub_by_gimmick: BTreeMap<String, RarityTable>,
}

impl ModeRarities {
    pub fn new(
        metagames: &ModeCollection,
        gimmicks: &ModeCollection,
        restrictions: &RestrictionGraph,
    ) -> Self {
        let default_metagame = RarityTable::from_collection(metagames);
        let default_gimmick = RarityTable::from_collection(gimmicks);
        let gimmick_by_metagame =
            gimmick_rarities_by_metagame(metagames, &default_gimmick, restrictions);
        let metagame_by_gimmick =
            metagame_rarities_by_gimmick(&gimmick_by_metagame, &default_metagame, &default_gimmick);
        let optional_sub_by_gimmick = optional_sub_rarities(gimmicks, &default_gimmick);

        Self {
            default_metagame,
            default_gimmick,
            gimmick_by_metagame,
            metagame_by_gimmick,
            optional_sub_by_gimmick,
        }
    }

    pub fn default_metagame(&self) -> &RarityTable {
        &self.default_metagame
    }

    pub fn default_gimmick(&self) -> &RarityTable {
        &self.default_gimmick
    }

    pub fn gimmick_by_metagame(&self, metagame_id: &str) -> Option<&RarityTable> {
        self.gimmick_by_metagame.get(metagame_id)
    }

    pub fn metagame_by_gimmick(&self, gimmick_id: &str) -> Option<&RarityTable> {
        self.metagame_by_gimmick.get(gimmick_id)
    }

    pub fn optional_sub_rarities(&self, gimmick_id: &str) -> Option<&RarityTable> {
        self.optional_sub_by_gimmick.get(gimmick_id)
    }

    /// Draws a metagame compatible with the already chosen gimmick, if any.
    pub fn select_metagame_id<R: Rng + ?Sized>(
        &self,
        restrictions: &RestrictionGraph,
        context: &DrawContext<'_>,
        rng: &mut R,
    ) -> ResolutionResult<String> {
        let mut preselected: Vec<&str> = context.gimmick_bases.to_vec();
        let mut available = match context.gimmick_primary {
            Some(primary) => {
                preselected.push(primary);
                self.metagame_by_gimmick(primary)
                    .unwrap_or(&self.default_metagame)
                    .clone()
            }
            None => self.default_metagame.clone(),
        };

        restrict(&mut available, restrictions, context, &preselected);
        available
            .select(rng)
            .map(str::to_string)
            .ok_or_else(|| no_eligible_mode(Family::Metagame, context))
    }

    /// Draws a gimmick compatible with every already chosen mode. When a
    /// primary gimmick is set, the draw fills one of its wildcard slots.
    pub fn select_gimmick_id<R: Rng + ?Sized>(
        &self,
        restrictions: &RestrictionGraph,
        context: &DrawContext<'_>,
        rng: &mut R,
    ) -> ResolutionResult<String> {
        let mut preselected: Vec<&str> = context
            .metagame_bases
            .iter()
            .chain(context.gimmick_bases)
            .copied()
            .collect();

        let mut available = match context.metagame_primary {
            Some(primary) => {
                preselected.push(primary);
                self.gimmick_by_metagame(primary)
                    .unwrap_or(&self.default_gimmick)
                    .clone()
            }
            None => self.default_gimmick.clone(),
        };
        if let Some(primary) = context.gimmick_primary {
            preselected.push(primary);
            available = self
                .optional_sub_rarities(primary)
                .unwrap_or(&self.default_gimmick)
                .clone();
        }

        restrict(&mut available, restrictions, context, &preselected);
        available
            .select(rng)
            .map(str::to_string)
            .ok_or_else(|| no_eligible_mode(Family::Gimmick, context))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }
}

fn restrict(
    table: &mut RarityTable,
    restrictions: &RestrictionGraph,
    context: &DrawContext<'_>,
    preselected: &[&str],
) {
    RestrictionGraph::zero_restricted(table, context.forbidden, &[] as &[&str]);
    if let Some(eligible) = context.eligible {
        table.zero_where(|id| !eligible.contains(&id));
    }
    restrictions.zero_conflicting(table, preselected);
}

fn no_eligible_mode(family: Family, context: &DrawContext<'_>) -> ResolutionError {
    ResolutionError::NoEligibleMode {
        family,
        context: format!("{:?}", context),
    }
}

fn gimmick_rarities_by_metagame(
    metagames: &ModeCollection,
    default_gimmick: &RarityTable,
    restrictions: &RestrictionGraph,
) -> BTreeMap<String, RarityTable> {
    let mut tables = BTreeMap::new();
    for metagame in metagames.all() {
        let Some(traits) = metagame.metagame_traits() else {
            continue;
        };
        let mut table = default_gimmick.clone();
        // Automated conflicts between the metagame and each gimmick.
        restrictions.zero_conflicting(&mut table, &[metagame.id()]);

        let blacklist = traits.gimmick_rarity_blacklist.as_slice();
        let whitelist = traits.gimmick_rarity_whitelist.as_slice();
        RestrictionGraph::zero_restricted(&mut table, blacklist, whitelist);

        for (gimmick_id, rarity) in &traits.gimmick_rarities {
            if blacklist.contains(gimmick_id)
                || (!whitelist.is_empty() && !whitelist.contains(gimmick_id))
            {
                warn!(
                    "Metagame {} specifies a rarity for gimmick {}, but that gimmick is blacklisted or not whitelisted",
                    metagame.id(),
                    gimmick_id
                );
            } else if !table.contains(gimmick_id) {
                debug!(
                    "Metagame {} specifies a rarity for gimmick {}, which is not active",
                    metagame.id(),
                    gimmick_id
                );
            } else {
                table.insert(gimmick_id, *rarity);
            }
        }
        tables.insert(metagame.id().to_string(), table);
    }
    tables
}

/// `default_metagame × (override / default_gimmick)` per gimmick and metagame.
fn metagame_rarities_by_gimmick(
    gimmick_by_metagame: &BTreeMap<String, RarityTable>,
    default_metagame: &RarityTable,
    default_gimmick: &RarityTable,
) -> BTreeMap<String, RarityTable> {
    let mut tables: BTreeMap<String, RarityTable> = BTreeMap::new();
    for (metagame_id, metagame_default) in default_metagame.entries() {
        let Some(gimmick_rarities) = gimmick_by_metagame.get(metagame_id) else {
            continue;
        };
        for (gimmick_id, rarity) in gimmick_rarities.entries() {
            let Some(gimmick_default) = default_gimmick.get(gimmick_id) else {
                continue;
            };
            let mut weight = metagame_default * rarity;
            if gimmick_default != 0.0 {
                weight /= gimmick_default;
            }
            tables
                .entry(gimmick_id.clone())
                .or_default()
                .insert(metagame_id, weight);
        }
    }
    tables
}

/// Tables for the wildcard slots of combos that configure their own sub
/// rarities, whitelist or blacklist.
fn optional_sub_rarities(
    gimmicks: &ModeCollection,
    default_gimmick: &RarityTable,
) -> BTreeMap<String, RarityTable> {
    let mut tables = BTreeMap::new();
    for combo in gimmicks.composites() {
        let Some(composition) = combo.composition() else {
            continue;
        };
        if !composition.has_sub_rarity_overrides() {
            continue;
        }

        let mut table: RarityTable = if composition.sub_mode_rarities.is_empty() {
            default_gimmick.clone()
        } else {
            composition
                .sub_mode_rarities
                .iter()
                .map(|(id, rarity)| (id.clone(), *rarity))
                .collect()
        };
        let whitelist = &composition.sub_mode_whitelist;
        let blacklist = &composition.sub_mode_blacklist;
        table.retain(|id| {
            gimmicks.is_base(id)
                && id != NORMAL_GIMMICK
                && (whitelist.is_empty() || whitelist.iter().any(|w| w == id))
                && !blacklist.iter().any(|b| b == id)
        });
        tables.insert(combo.id().to_string(), table);
    }
    tables
}

/// Every mode whose weight in `table` is positive.
pub fn selectable_ids<'a>(table: &RarityTable, modes: &'a [Arc<Mode>]) -> Vec<&'a str> {
    modes
        .iter()
        .map(|mode| mode.id())
        .filter(|id| table.get(id).is_some_and(|rarity| rarity > 0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{DefKind, ModeEntry};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use schema::{ModeDef, PairSpec, RestrictionsConfig};

    fn entry(id: &str, kind: DefKind, rarity: f64) -> ModeEntry {
        ModeEntry {
            id: id.to_string(),
            kind,
            def: ModeDef {
                display_name: Some(id.to_string()),
                description: Some(String::new()),
                rarity: Some(rarity),
                set_tag: (kind == DefKind::BaseMetagame).then(|| id.to_string()),
                ..Default::default()
            },
        }
    }

    struct Fixture {
        metagames: ModeCollection,
        gimmicks: ModeCollection,
        restrictions: RestrictionGraph,
        rarities: ModeRarities,
    }

    fn fixture() -> Fixture {
        let mut advanced = entry("advanced", DefKind::BaseMetagame, 2.0);
        advanced.def.gimmick_rarities = BTreeMap::from([
            ("speed".to_string(), 4.0),
            ("inverse".to_string(), 9.0),
            ("missing".to_string(), 1.0),
        ]);
        advanced.def.gimmick_rarity_blacklist = vec!["inverse".to_string()];

        let mut combo = entry("double", DefKind::RandomCombo, 1.0);
        combo.def.sub_modes = Some(vec!["*".to_string(), "*".to_string()]);
        combo.def.sub_mode_rarities_blacklist = vec!["inverse".to_string()];

        let metagames = ModeCollection::from_entries(
            Family::Metagame,
            &[entry("default", DefKind::BaseMetagame, 1.0), advanced],
        )
        .unwrap();
        let gimmicks = ModeCollection::from_entries(
            Family::Gimmick,
            &[
                entry("normal", DefKind::BaseGimmick, 3.0),
                entry("speed", DefKind::BaseGimmick, 2.0),
                entry("inverse", DefKind::BaseGimmick, 1.0),
                entry("duel", DefKind::BaseGimmick, 1.0),
                combo,
            ],
        )
        .unwrap();

        let mut config = RestrictionsConfig::default();
        config.automated_matchmaking.mode_pair_blacklists =
            vec![PairSpec::Pair("default".into(), "duel".into())];
        let restrictions = RestrictionGraph::new(&metagames, &gimmicks, &config);
        let rarities = ModeRarities::new(&metagames, &gimmicks, &restrictions);
        Fixture {
            metagames,
            gimmicks,
            restrictions,
            rarities,
        }
    }

    #[test]
    fn test_gimmick_rarities_by_metagame() {
        let fixture = fixture();
        let default = fixture.rarities.gimmick_by_metagame("default").unwrap();
        assert_eq!(default.get("duel"), Some(0.0));
        assert_eq!(default.get("speed"), Some(2.0));

        let advanced = fixture.rarities.gimmick_by_metagame("advanced").unwrap();
        assert_eq!(advanced.get("speed"), Some(4.0));
        assert_eq!(advanced.get("inverse"), Some(0.0));
        assert_eq!(advanced.get("duel"), Some(1.0));
        assert!(!advanced.contains("missing"));
    }

    #[test]
    fn test_metagame_rarities_by_gimmick() {
        let fixture = fixture();
        let speed = fixture.rarities.metagame_by_gimmick("speed").unwrap();
        // default: 1 * 2 / 2, advanced: 2 * 4 / 2
        assert_eq!(speed.get("default"), Some(1.0));
        assert_eq!(speed.get("advanced"), Some(4.0));

        let duel = fixture.rarities.metagame_by_gimmick("duel").unwrap();
        assert_eq!(duel.get("default"), Some(0.0));
    }

    #[test]
    fn test_optional_sub_rarities_drop_normal() {
        let fixture = fixture();
        let table = fixture.rarities.optional_sub_rarities("double").unwrap();
        let ids: Vec<&str> = table.entries().iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["speed", "duel"]);
    }

    #[test]
    fn test_selection_honours_conflicts() {
        let fixture = fixture();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let context = DrawContext {
                metagame_primary: Some("default"),
                metagame_bases: &["default"],
                forbidden: &["speed"],
                ..Default::default()
            };
            let id = fixture
                .rarities
                .select_gimmick_id(&fixture.restrictions, &context, &mut rng)
                .unwrap();
            assert!(id != "duel" && id != "speed", "drew {}", id);
        }
    }

    #[test]
    fn test_exhausted_table_is_an_error() {
        let fixture = fixture();
        let mut rng = StdRng::seed_from_u64(1);
        let context = DrawContext {
            forbidden: &["default", "advanced"],
            ..Default::default()
        };
        let result = fixture
            .rarities
            .select_metagame_id(&fixture.restrictions, &context, &mut rng);
        assert!(matches!(
            result,
            Err(ResolutionError::NoEligibleMode {
                family: Family::Metagame,
                ..
            })
        ));
    }

    #[test]
    fn test_tables_are_a_pure_function_of_configuration() {
        let first = fixture();
        let second = fixture();
        assert_eq!(first.rarities.to_bytes().unwrap(), second.rarities.to_bytes().unwrap());
        assert_eq!(
            first.restrictions.to_bytes().unwrap(),
            second.restrictions.to_bytes().unwrap()
        );
        assert_eq!(
            selectable_ids(first.rarities.default_metagame(), first.metagames.all()),
            vec!["default", "advanced"]
        );
        assert_eq!(first.gimmicks.len(), 5);
    }
}
