//! Symmetric "may not co-occur" relation over mode ids.

use crate::errors::{InvalidRequest, ResolutionError, ResolutionResult};
use crate::modes::categories::categories_conflict;
use crate::modes::{Mode, ModeCollection};
use crate::rarities::RarityTable;
use schema::{CloneRules, Family, PairSpec, RestrictionsConfig, NORMAL_GIMMICK};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Which blacklist applies: automated rolls or user bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RestrictionContext {
    Automated,
    Bid,
}

pub type PairBlacklists = BTreeMap<String, BTreeSet<String>>;

fn blacklist_pair(blacklists: &mut PairBlacklists, a: &str, b: &str) {
    if !blacklists.contains_key(a) || !blacklists.contains_key(b) {
        return;
    }
    if let Some(set) = blacklists.get_mut(a) {
        set.insert(b.to_string());
    }
    if let Some(set) = blacklists.get_mut(b) {
        set.insert(a.to_string());
    }
}

fn add_pair_specs(blacklists: &mut PairBlacklists, specs: &[PairSpec]) {
    for spec in specs {
        for (a, b) in spec.pairs() {
            blacklist_pair(blacklists, a, b);
        }
    }
}

/// Mode conflicts for both contexts, plus the bid-only rules that depend on
/// the requested rosters or clone target.
///
/// Every active id is a key of both maps and always conflicts with itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestrictionGraph {
    automated: PairBlacklists,
    bid: PairBlacklists,
    team_choice_blacklist: BTreeSet<String>,
    clone_rules: CloneRules,
    first_aliases: BTreeMap<String, String>,
}

impl RestrictionGraph {
    pub fn new(
        metagames: &ModeCollection,
        gimmicks: &ModeCollection,
        config: &RestrictionsConfig,
    ) -> Self {
        let all_modes: Vec<&Arc<Mode>> = metagames.all().iter().chain(gimmicks.all()).collect();

        // Self exclusion.
        let mut automated: PairBlacklists = all_modes
            .iter()
            .map(|mode| {
                (
                    mode.id().to_string(),
                    BTreeSet::from([mode.id().to_string()]),
                )
            })
            .collect();
        let mut bid = automated.clone();

        // Bid metagame mixing is opt-in through biddable composites.
        for first in metagames.all() {
            for second in metagames.all() {
                if first.id() != second.id() {
                    blacklist_pair(&mut bid, first.id(), second.id());
                }
            }
        }
        for composite in metagames.composites().filter(|mode| mode.is_biddable()) {
            let Some(composition) = composite.composition() else {
                continue;
            };
            let components: Vec<&str> = composition.fixed_ids().collect();
            for first in &components {
                for second in &components {
                    if first != second {
                        if let Some(set) = bid.get_mut(*first) {
                            set.remove(*second);
                        }
                    }
                }
            }
        }

        // The normal gimmick stands for "no gimmick" and never combines.
        let normal_pairs: Vec<PairSpec> = if gimmicks.is_base(NORMAL_GIMMICK) {
            gimmicks
                .base_modes()
                .filter(|mode| mode.id() != NORMAL_GIMMICK)
                .map(|mode| PairSpec::Pair(NORMAL_GIMMICK.to_string(), mode.id().to_string()))
                .collect()
        } else {
            Vec::new()
        };

        add_pair_specs(&mut automated, &config.automated_pairs());
        add_pair_specs(&mut automated, &normal_pairs);
        add_pair_specs(&mut bid, &config.token_pairs());
        add_pair_specs(&mut bid, &normal_pairs);

        // Base gimmicks declaring the same non-mergeable category.
        let base_gimmicks: Vec<&Arc<Mode>> = gimmicks.base_modes().collect();
        for first in &base_gimmicks {
            for second in &base_gimmicks {
                if let (Some(a), Some(b)) = (first.categories(), second.categories()) {
                    if categories_conflict(a, b) {
                        blacklist_pair(&mut automated, first.id(), second.id());
                        blacklist_pair(&mut bid, first.id(), second.id());
                    }
                }
            }
        }

        // Composites inherit the conflicts of their fixed components. Wildcard
        // slots are checked when they are drawn.
        for composite in metagames.composites().chain(gimmicks.composites()) {
            let Some(composition) = composite.composition() else {
                continue;
            };
            for component in composition.fixed_ids() {
                for blacklists in [&mut automated, &mut bid] {
                    let conflicting: Vec<String> = blacklists
                        .get(component)
                        .map(|set| set.iter().cloned().collect())
                        .unwrap_or_default();
                    for other in conflicting {
                        if composite.family() == Family::Metagame && metagames.contains(&other) {
                            continue;
                        }
                        blacklist_pair(blacklists, composite.id(), &other);
                    }
                }
            }
        }

        let mut first_aliases = metagames.id_to_first_alias();
        first_aliases.extend(gimmicks.id_to_first_alias());

        Self {
            automated,
            bid,
            team_choice_blacklist: config.token_matchmaking.team_choice_blacklist.clone(),
            clone_rules: config.token_matchmaking.clone_rules.clone(),
            first_aliases,
        }
    }

    fn blacklists(&self, context: RestrictionContext) -> &PairBlacklists {
        match context {
            RestrictionContext::Automated => &self.automated,
            RestrictionContext::Bid => &self.bid,
        }
    }

    /// Ids that may not co-occur with `id`, including `id` itself.
    pub fn blacklist(&self, context: RestrictionContext, id: &str) -> Option<&BTreeSet<String>> {
        self.blacklists(context).get(id)
    }

    pub fn conflicts(&self, context: RestrictionContext, a: &str, b: &str) -> bool {
        self.blacklist(context, a).is_some_and(|set| set.contains(b))
    }

    /// The bidder-facing name of an id.
    pub fn alias_or_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.first_aliases.get(id).map(String::as_str).unwrap_or(id)
    }

    /// First conflicting pair among distinct ids, in the order given.
    fn first_conflict<'a>(&self, context: RestrictionContext, ids: &[&'a str]) -> Option<(&'a str, &'a str)> {
        let unique: Vec<&'a str> = ids
            .iter()
            .enumerate()
            .filter(|(index, id)| !ids[..*index].contains(*id))
            .map(|(_, id)| *id)
            .collect();
        for (i, first) in unique.iter().enumerate() {
            for (j, second) in unique.iter().enumerate() {
                if i != j && self.conflicts(context, first, second) {
                    return Some((*first, *second));
                }
            }
        }
        None
    }

    /// Checks every pair of `ids` against the given context.
    pub fn validate(&self, ids: &[&str], context: RestrictionContext) -> ResolutionResult<()> {
        match self.first_conflict(context, ids) {
            Some((a, b)) => Err(ResolutionError::Conflict(
                self.alias_or_id(a).to_string(),
                self.alias_or_id(b).to_string(),
            )),
            None => Ok(()),
        }
    }

    /// Validates the base modes of a bid.
    pub fn validate_bid(
        &self,
        metagame_ids: &[&str],
        gimmick_ids: &[&str],
        clone_requested: bool,
        teams_chosen: bool,
    ) -> Result<(), InvalidRequest> {
        let all_ids: Vec<&str> = metagame_ids.iter().chain(gimmick_ids).copied().collect();

        if let Some((a, b)) = self.first_conflict(RestrictionContext::Bid, &all_ids) {
            return Err(InvalidRequest::ModesConflict(
                self.alias_or_id(a).to_string(),
                self.alias_or_id(b).to_string(),
            ));
        }

        if teams_chosen {
            if let Some(id) = all_ids
                .iter()
                .find(|id| self.team_choice_blacklist.contains(**id))
            {
                return Err(InvalidRequest::TeamChoiceRestriction(
                    self.alias_or_id(id).to_string(),
                ));
            }
        }

        if clone_requested {
            let rules = &self.clone_rules;
            let companions = gimmick_ids
                .iter()
                .filter(|id| **id != rules.gimmick && !rules.free_companions.contains(**id))
                .count();
            if companions > rules.max_companions {
                return Err(InvalidRequest::TooManyCloneCompanions(rules.max_companions));
            }
            if let Some(id) = gimmick_ids.iter().find(|id| rules.conflicts.contains(**id)) {
                return Err(InvalidRequest::CloneConflict(self.alias_or_id(id).to_string()));
            }
        }
        Ok(())
    }

    /// Zeroes every entry of `table` that conflicts, in automated
    /// matchmaking, with an already chosen id.
    pub fn zero_conflicting(&self, table: &mut RarityTable, preselected: &[&str]) {
        for id in preselected {
            if let Some(conflicting) = self.automated.get(*id) {
                for other in conflicting {
                    table.zero(other);
                }
            }
        }
    }

    /// Zeroes every entry that is blacklisted, or missing from a non-empty whitelist.
    pub fn zero_restricted<B, W>(table: &mut RarityTable, blacklist: &[B], whitelist: &[W])
    where
        B: AsRef<str>,
        W: AsRef<str>,
    {
        table.zero_where(|id| {
            blacklist.iter().any(|b| b.as_ref() == id)
                || (!whitelist.is_empty() && !whitelist.iter().any(|w| w.as_ref() == id))
        });
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{DefKind, ModeEntry};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use schema::{CategoryDef, CategoryKind, ModeDef};

    fn def(id: &str, kind: DefKind) -> ModeDef {
        ModeDef {
            display_name: Some(id.to_string()),
            description: Some(String::new()),
            bid_aliases: vec![format!("{}_alias", id)],
            set_tag: (kind == DefKind::BaseMetagame).then(|| id.to_string()),
            rarity: Some(1.0),
            ..Default::default()
        }
    }

    fn entry(id: &str, kind: DefKind) -> ModeEntry {
        ModeEntry {
            id: id.to_string(),
            kind,
            def: def(id, kind),
        }
    }

    fn composite(id: &str, kind: DefKind, sub_modes: &[&str]) -> ModeEntry {
        let mut entry = entry(id, kind);
        entry.def.sub_modes = Some(sub_modes.iter().map(|s| s.to_string()).collect());
        entry
    }

    fn with_category(mut entry: ModeEntry, kind: CategoryKind, tag: &str) -> ModeEntry {
        entry.def.categories.insert(
            kind,
            CategoryDef {
                tag: Some(tag.to_string()),
                ..Default::default()
            },
        );
        entry
    }

    fn collections() -> (ModeCollection, ModeCollection) {
        let metagames = ModeCollection::from_entries(
            Family::Metagame,
            &[
                entry("default", DefKind::BaseMetagame),
                entry("advanced", DefKind::BaseMetagame),
                entry("hackmons", DefKind::BaseMetagame),
                composite("advanced_vs_hackmons", DefKind::VersusMix, &["advanced", "hackmons"]),
            ],
        )
        .unwrap();
        let gimmicks = ModeCollection::from_entries(
            Family::Gimmick,
            &[
                entry("normal", DefKind::BaseGimmick),
                with_category(entry("random_moves", DefKind::BaseGimmick), CategoryKind::InputChange, "random_moves"),
                with_category(entry("defiance", DefKind::BaseGimmick), CategoryKind::InputChange, "defiance"),
                with_category(entry("speed", DefKind::BaseGimmick), CategoryKind::BattleChange, "speed"),
                with_category(entry("inverse", DefKind::BaseGimmick), CategoryKind::BattleChange, "inverse"),
                composite("speed_combo", DefKind::RandomCombo, &["speed", "*"]),
            ],
        )
        .unwrap();
        (metagames, gimmicks)
    }

    fn graph(config: &RestrictionsConfig) -> RestrictionGraph {
        let (metagames, gimmicks) = collections();
        RestrictionGraph::new(&metagames, &gimmicks, config)
    }

    #[test]
    fn test_self_and_normal_exclusion() {
        let graph = graph(&RestrictionsConfig::default());
        for context in [RestrictionContext::Automated, RestrictionContext::Bid] {
            assert!(graph.conflicts(context, "speed", "speed"));
            assert!(graph.conflicts(context, "normal", "speed"));
            assert!(graph.conflicts(context, "inverse", "normal"));
        }
    }

    #[test]
    fn test_category_conflicts() {
        let graph = graph(&RestrictionsConfig::default());
        assert!(graph.conflicts(RestrictionContext::Automated, "random_moves", "defiance"));
        assert!(!graph.conflicts(RestrictionContext::Automated, "speed", "inverse"));
    }

    #[test]
    fn test_bid_metagames_mix_only_through_composites() {
        let graph = graph(&RestrictionsConfig::default());
        assert!(graph.conflicts(RestrictionContext::Bid, "default", "advanced"));
        assert!(!graph.conflicts(RestrictionContext::Bid, "advanced", "hackmons"));
        assert!(!graph.conflicts(RestrictionContext::Automated, "default", "advanced"));
    }

    #[test]
    fn test_configured_pairs_and_lifted_restrictions() {
        let mut config = RestrictionsConfig::default();
        config.automated_and_token_matchmaking.mode_pair_blacklists = vec![
            PairSpec::Pair("hackmons".into(), "speed".into()),
            PairSpec::Cross(vec!["advanced".into()], vec!["speed".into(), "inverse".into()]),
        ];
        config.lift_restrictions = vec![PairSpec::Pair("hackmons".into(), "speed".into())];
        let graph = graph(&config);

        assert!(!graph.conflicts(RestrictionContext::Automated, "hackmons", "speed"));
        assert!(graph.conflicts(RestrictionContext::Bid, "inverse", "advanced"));
        // The versus composite inherits the conflicts of its components.
        assert!(graph.conflicts(RestrictionContext::Automated, "advanced_vs_hackmons", "speed"));
        assert!(!graph.conflicts(RestrictionContext::Automated, "advanced_vs_hackmons", "advanced"));
        // So does the gimmick combo, including its own fixed component.
        assert!(graph.conflicts(RestrictionContext::Automated, "speed_combo", "advanced"));
        assert!(graph.conflicts(RestrictionContext::Automated, "speed_combo", "speed"));
    }

    #[test]
    fn test_validate_bid_names_aliases() {
        let mut config = RestrictionsConfig::default();
        config.token_matchmaking.mode_pair_blacklists =
            vec![PairSpec::Pair("speed".into(), "inverse".into())];
        config.token_matchmaking.team_choice_blacklist = BTreeSet::from(["defiance".to_string()]);
        let graph = graph(&config);

        assert_eq!(
            graph.validate_bid(&["default"], &["speed", "inverse"], false, false),
            Err(InvalidRequest::ModesConflict(
                "speed_alias".to_string(),
                "inverse_alias".to_string()
            ))
        );
        assert_eq!(graph.validate_bid(&["default"], &["speed"], false, false), Ok(()));
        assert_eq!(
            graph.validate_bid(&["default"], &["defiance"], false, true),
            Err(InvalidRequest::TeamChoiceRestriction("defiance_alias".to_string()))
        );
        // Automated rolls are unaffected by bid-only pairs.
        assert_eq!(
            graph.validate(&["speed", "inverse"], RestrictionContext::Automated),
            Ok(())
        );
    }

    #[test]
    fn test_zeroing_helpers() {
        let (metagames, gimmicks) = collections();
        let graph = RestrictionGraph::new(&metagames, &gimmicks, &RestrictionsConfig::default());
        let mut table = RarityTable::from_collection(&gimmicks);
        graph.zero_conflicting(&mut table, &["random_moves"]);
        assert_eq!(table.get("random_moves"), Some(0.0));
        assert_eq!(table.get("defiance"), Some(0.0));
        assert_eq!(table.get("normal"), Some(0.0));
        assert_eq!(table.get("speed"), Some(1.0));

        RestrictionGraph::zero_restricted(&mut table, &["speed"], &["speed", "inverse"]);
        assert_eq!(table.get("speed"), Some(0.0));
        assert_eq!(table.get("inverse"), Some(1.0));
        assert_eq!(table.get("speed_combo"), Some(0.0));
    }

    proptest! {
        #[test]
        fn prop_blacklists_are_symmetric(pairs in prop::collection::vec((0usize..9, 0usize..9), 0..12)) {
            let ids = [
                "default", "advanced", "hackmons", "advanced_vs_hackmons",
                "random_moves", "defiance", "speed", "inverse", "speed_combo",
            ];
            let mut config = RestrictionsConfig::default();
            config.automated_matchmaking.mode_pair_blacklists = pairs
                .iter()
                .map(|(a, b)| PairSpec::Pair(ids[*a].to_string(), ids[*b].to_string()))
                .collect();
            config.token_matchmaking.mode_pair_blacklists = config.automated_matchmaking.mode_pair_blacklists.clone();
            let graph = graph(&config);

            for context in [RestrictionContext::Automated, RestrictionContext::Bid] {
                for a in ids {
                    prop_assert!(graph.conflicts(context, a, a));
                    for b in ids {
                        prop_assert_eq!(graph.conflicts(context, a, b), graph.conflicts(context, b, a));
                    }
                }
            }
        }
    }
}
