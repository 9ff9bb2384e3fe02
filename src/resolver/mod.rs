//! Turns an automated roll or the mode tokens of a bid into a consistent
//! metagame and gimmick for one match.
//!
//! The resolver owns the registries, the restriction graph and the rarity
//! tables of one event. All of them are built once in [`ModeResolver::new`]
//! and never mutated afterwards, so resolutions only keep local state.

use crate::config::ConfigSet;
use crate::cooldowns::{CooldownTracker, LARGE_TEAMS, UNEVEN_TEAMS};
use crate::errors::{
    ConfigError, ConfigResult, InvalidRequest, MatchmakerResult, ResolutionError,
    ResolutionResult,
};
use crate::modes::{
    prepare_modes, stringify_list, validate_registries, Category, Component, CompositeKind,
    Composition, GimmickRequest, MatchMode, Mode, ModeCollection, MustContain,
};
use crate::rarities::{DrawContext, ModeRarities};
use crate::restrictions::{RestrictionContext, RestrictionGraph};
use rand::seq::SliceRandom;
use rand::Rng;
use schema::{CategoryKind, Family, MatchmakerConfig, NORMAL_GIMMICK};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

#[cfg(test)]
pub(crate) mod tests;

/// The mode part of a parsed bid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidRequest {
    /// Mode aliases, ids, `switch` and clone species, as typed.
    pub tokens: Vec<String>,
    /// Whether the bid names both rosters.
    pub teams_specified: bool,
    pub ally_hit: Option<u32>,
}

/// Help entry for one bid alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeHelp {
    pub display_name: String,
    pub description: String,
    /// First alias of the mode, followed by its emoji when it has one.
    pub bid_alias: String,
    pub family: Family,
}

/// Tokens of a bid sorted into what they name.
#[derive(Debug, Default)]
struct BidTokens {
    metagames: Vec<Arc<Mode>>,
    gimmicks: Vec<Arc<Mode>>,
    switching: bool,
    clone_target: Option<String>,
}

type SplitModes = (Option<Arc<Mode>>, Vec<Arc<Mode>>);

pub struct ModeResolver {
    config: MatchmakerConfig,
    metagames: ModeCollection,
    gimmicks: ModeCollection,
    restrictions: RestrictionGraph,
    rarities: ModeRarities,
    must_contain: MustContain,
}

impl ModeResolver {
    /// Builds every registry and derived table for the event of `config_set`.
    pub fn new(config_set: &ConfigSet) -> ConfigResult<Self> {
        let config = &config_set.settings;
        let prepared = prepare_modes(
            config,
            &config_set.metagames,
            &config_set.gimmicks,
            &config_set.event,
        )?;

        let metagames = ModeCollection::from_entries(Family::Metagame, &prepared.metagames)?;
        let gimmicks = ModeCollection::from_entries(Family::Gimmick, &prepared.gimmicks)?;
        validate_registries(&metagames, &gimmicks)?;

        for (collection, id) in [
            (&metagames, &config.default_metagame),
            (&gimmicks, &config.default_gimmick),
        ] {
            if !collection.is_base(id) {
                return Err(ConfigError::MissingDefault {
                    family: collection.family(),
                    id: id.clone(),
                });
            }
        }

        let restrictions = RestrictionGraph::new(&metagames, &gimmicks, &config.restrictions);
        let rarities = ModeRarities::new(&metagames, &gimmicks, &restrictions);

        info!(
            "Mode registries ready for event `{}`: {} metagames, {} gimmicks",
            config_set.event_id,
            metagames.len(),
            gimmicks.len()
        );

        Ok(Self {
            config: config.clone(),
            metagames,
            gimmicks,
            restrictions,
            rarities,
            must_contain: prepared.must_contain,
        })
    }

    pub fn config(&self) -> &MatchmakerConfig {
        &self.config
    }

    pub fn metagames(&self) -> &ModeCollection {
        &self.metagames
    }

    pub fn gimmicks(&self) -> &ModeCollection {
        &self.gimmicks
    }

    pub fn restrictions(&self) -> &RestrictionGraph {
        &self.restrictions
    }

    pub fn rarities(&self) -> &ModeRarities {
        &self.rarities
    }

    pub fn must_contain(&self) -> &MustContain {
        &self.must_contain
    }

    // --- Automated resolution ---

    /// Draws a metagame, then a gimmick compatible with it.
    pub fn resolve_automated<R: Rng + ?Sized>(
        &self,
        forbidden: &[&str],
        rng: &mut R,
    ) -> ResolutionResult<(MatchMode, MatchMode)> {
        let metagame = self.make_metagame(None, forbidden, rng)?;
        let gimmick = self.make_gimmick(Some(&metagame), forbidden, rng)?;
        self.validate_pair(&metagame, &gimmick)?;
        Ok((metagame, gimmick))
    }

    /// Draws a metagame for an already chosen gimmick.
    pub fn resolve_for_gimmick<R: Rng + ?Sized>(
        &self,
        gimmick: MatchMode,
        forbidden: &[&str],
        rng: &mut R,
    ) -> ResolutionResult<(MatchMode, MatchMode)> {
        let metagame = self.make_metagame(Some(&gimmick), forbidden, rng)?;
        self.validate_pair(&metagame, &gimmick)?;
        Ok((metagame, gimmick))
    }

    fn validate_pair(&self, metagame: &MatchMode, gimmick: &MatchMode) -> ResolutionResult<()> {
        let base_ids: Vec<&str> = metagame
            .base_ids()
            .into_iter()
            .chain(gimmick.base_ids())
            .collect();
        self.restrictions
            .validate(&base_ids, RestrictionContext::Automated)
    }

    pub fn make_metagame<R: Rng + ?Sized>(
        &self,
        gimmick: Option<&MatchMode>,
        forbidden: &[&str],
        rng: &mut R,
    ) -> ResolutionResult<MatchMode> {
        let gimmick_bases = gimmick.map(MatchMode::base_ids).unwrap_or_default();
        let context = DrawContext {
            gimmick_primary: gimmick.map(MatchMode::primary_id),
            gimmick_bases: &gimmick_bases,
            forbidden,
            ..Default::default()
        };
        let primary_id = self
            .rarities
            .select_metagame_id(&self.restrictions, &context, rng)?;
        let primary = base_or_composite(&self.metagames, &primary_id)?;

        let base_modes = match primary.composition() {
            None => vec![Arc::clone(primary)],
            Some(composition) => {
                self.select_metagame_bases(primary, composition, forbidden, rng)?
            }
        };
        MatchMode::make(primary, base_modes, GimmickRequest::default(), rng)
    }

    pub fn make_gimmick<R: Rng + ?Sized>(
        &self,
        metagame: Option<&MatchMode>,
        forbidden: &[&str],
        rng: &mut R,
    ) -> ResolutionResult<MatchMode> {
        let metagame_bases = metagame.map(MatchMode::base_ids).unwrap_or_default();
        let context = DrawContext {
            metagame_primary: metagame.map(MatchMode::primary_id),
            metagame_bases: &metagame_bases,
            forbidden,
            ..Default::default()
        };
        let primary_id = self
            .rarities
            .select_gimmick_id(&self.restrictions, &context, rng)?;
        let primary = base_or_composite(&self.gimmicks, &primary_id)?;

        let base_modes = match primary.composition() {
            None => vec![Arc::clone(primary)],
            Some(composition) => {
                self.select_gimmick_bases(primary, composition, metagame, forbidden, rng)?
            }
        };
        MatchMode::make(primary, base_modes, GimmickRequest::default(), rng)
    }

    pub fn make_normal_gimmick<R: Rng + ?Sized>(&self, rng: &mut R) -> ResolutionResult<MatchMode> {
        let normal = base_or_composite(&self.gimmicks, NORMAL_GIMMICK)?;
        MatchMode::make(normal, vec![Arc::clone(normal)], GimmickRequest::default(), rng)
    }

    /// Versus mixes use two distinct components drawn at random; random mixes
    /// use every component that is not forbidden.
    fn select_metagame_bases<R: Rng + ?Sized>(
        &self,
        primary: &Mode,
        composition: &Composition,
        forbidden: &[&str],
        rng: &mut R,
    ) -> ResolutionResult<Vec<Arc<Mode>>> {
        let mut ids: Vec<&str> = composition
            .fixed_ids()
            .filter(|id| !forbidden.contains(id))
            .collect();
        if ids.len() < 2 {
            return Err(ResolutionError::TooFewComponents {
                primary: primary.id().to_string(),
                available: ids.iter().map(|id| id.to_string()).collect(),
            });
        }
        if composition.kind == CompositeKind::VersusMix {
            ids.shuffle(rng);
            ids.truncate(2);
        }
        self.metagames.sort_ids(&mut ids);
        ids.into_iter()
            .map(|id| base_mode(&self.metagames, id))
            .collect()
    }

    /// Fixed components are used as they are. Each wildcard draws one more
    /// base gimmick that fits everything chosen so far.
    fn select_gimmick_bases<R: Rng + ?Sized>(
        &self,
        primary: &Mode,
        composition: &Composition,
        metagame: Option<&MatchMode>,
        forbidden: &[&str],
        rng: &mut R,
    ) -> ResolutionResult<Vec<Arc<Mode>>> {
        let metagame_bases = metagame.map(MatchMode::base_ids).unwrap_or_default();
        let eligible: Vec<&str> = self.gimmicks.base_modes().map(|mode| mode.id()).collect();
        let mut wildcard_forbidden = forbidden.to_vec();
        wildcard_forbidden.push(NORMAL_GIMMICK);

        let mut chosen: Vec<String> = Vec::new();
        for component in &composition.components {
            let id = match component {
                Component::Id(id) => {
                    if forbidden.contains(&id.as_str()) {
                        return Err(ResolutionError::ForbiddenComponent {
                            family: Family::Gimmick,
                            primary: primary.id().to_string(),
                            component: id.clone(),
                        });
                    }
                    id.clone()
                }
                Component::Wildcard => {
                    let chosen_ids: Vec<&str> = chosen.iter().map(String::as_str).collect();
                    let context = DrawContext {
                        eligible: Some(eligible.as_slice()),
                        metagame_primary: metagame.map(MatchMode::primary_id),
                        metagame_bases: &metagame_bases,
                        gimmick_primary: Some(primary.id()),
                        gimmick_bases: &chosen_ids,
                        forbidden: &wildcard_forbidden,
                    };
                    self.rarities
                        .select_gimmick_id(&self.restrictions, &context, rng)?
                }
            };
            chosen.push(id);
        }

        self.gimmicks.sort_ids(&mut chosen);
        chosen
            .iter()
            .map(|id| base_mode(&self.gimmicks, id))
            .collect()
    }

    // --- Bid resolution ---

    /// Resolves the modes named by a bid. Nothing is drawn except the
    /// components of a versus mix and the random-choice settings.
    pub fn resolve_from_bid<R: Rng + ?Sized>(
        &self,
        bid: &BidRequest,
        cooldowns: &CooldownTracker,
        rng: &mut R,
    ) -> MatchmakerResult<(MatchMode, MatchMode)> {
        let tokens = self.match_tokens(&bid.tokens)?;
        debug!(
            "Bid tokens matched {} metagames and {} gimmicks",
            tokens.metagames.len(),
            tokens.gimmicks.len()
        );

        let (metagame_primary, mut metagame_bases) = split_modes(
            &self.metagames,
            &tokens.metagames,
            &self.config.default_metagame,
            rng,
        )?;
        let (gimmick_primary, mut gimmick_bases) = split_modes(
            &self.gimmicks,
            &tokens.gimmicks,
            &self.config.default_gimmick,
            rng,
        )?;

        for mode in metagame_bases.iter().chain(&gimmick_bases) {
            let remaining = cooldowns.remaining(mode.id());
            if remaining > 0 {
                return Err(InvalidRequest::CoolingDown {
                    alias: mode.first_bid_alias_or_id(false),
                    remaining,
                }
                .into());
            }
        }

        sort_modes(&self.metagames, &mut metagame_bases);
        sort_modes(&self.gimmicks, &mut gimmick_bases);
        let metagame_ids: Vec<&str> = metagame_bases.iter().map(|m| m.id()).collect();
        let gimmick_ids: Vec<&str> = gimmick_bases.iter().map(|m| m.id()).collect();

        if metagame_ids.len() > self.config.max_metagames {
            return Err(InvalidRequest::TooManyModes {
                family: Family::Metagame,
                max: self.config.max_metagames,
            }
            .into());
        }
        if gimmick_ids.len() > self.config.max_gimmicks {
            return Err(InvalidRequest::TooManyModes {
                family: Family::Gimmick,
                max: self.config.max_gimmicks,
            }
            .into());
        }

        self.restrictions.validate_bid(
            &metagame_ids,
            &gimmick_ids,
            tokens.clone_target.is_some(),
            bid.teams_specified,
        )?;
        self.check_required_gimmicks(&gimmick_ids, bid.ally_hit)?;

        let metagame_primary =
            metagame_primary.ok_or(InvalidRequest::CannotCombine(Family::Metagame))?;
        let gimmick_primary =
            gimmick_primary.ok_or(InvalidRequest::CannotCombine(Family::Gimmick))?;

        if let Some(species) = &tokens.clone_target {
            self.validate_clone(species, &gimmick_bases)?;
        }

        let metagame = MatchMode::make(
            &metagame_primary,
            metagame_bases,
            GimmickRequest::default(),
            rng,
        )?;
        let gimmick = MatchMode::make(
            &gimmick_primary,
            gimmick_bases,
            GimmickRequest {
                clone_target: tokens.clone_target,
                switching_requested: Some(tokens.switching),
            },
            rng,
        )?;
        Ok((metagame, gimmick))
    }

    fn match_tokens(&self, tokens: &[String]) -> Result<BidTokens, InvalidRequest> {
        let mut matched = BidTokens::default();
        for token in tokens {
            let metagame = self.metagames.get(token);
            let gimmick = self.gimmicks.get(token);

            if let Some(mode) = metagame.or(gimmick) {
                if !mode.is_biddable() {
                    return Err(InvalidRequest::IneligibleMode(
                        mode.first_bid_alias_or_id(false),
                    ));
                }
            }

            if let Some(mode) = metagame {
                push_unique(&mut matched.metagames, mode);
            } else if let Some(mode) = gimmick {
                push_unique(&mut matched.gimmicks, mode);
            } else if token.eq_ignore_ascii_case("switch") || token.eq_ignore_ascii_case("switching")
            {
                matched.switching = true;
            } else if let Some(species) = self.clone_species(token) {
                matched.clone_target = Some(species);
            } else {
                return Err(InvalidRequest::ModeNotExisting(token.clone()));
            }
        }
        Ok(matched)
    }

    /// A species named in the pool of any species replacement gimmick.
    fn clone_species(&self, token: &str) -> Option<String> {
        self.gimmicks
            .base_modes()
            .filter_map(|mode| {
                mode.categories()?
                    .get(&CategoryKind::SpeciesReplace)?
                    .as_pool()?
                    .pool
                    .as_ref()
            })
            .flatten()
            .find(|species| species.eq_ignore_ascii_case(token))
            .cloned()
    }

    fn validate_clone(&self, species: &str, gimmick_bases: &[Arc<Mode>]) -> Result<(), InvalidRequest> {
        let clone_id = self.config.restrictions.token_matchmaking.clone_rules.gimmick.as_str();
        let Some(clone) = gimmick_bases.iter().find(|mode| mode.id() == clone_id) else {
            return Err(InvalidRequest::SpeciesWithoutClone);
        };
        let cloneable = clone
            .categories()
            .and_then(|categories| categories.get(&CategoryKind::SpeciesReplace))
            .and_then(Category::as_pool)
            .is_some_and(|pool| pool.contains(species));
        if cloneable {
            Ok(())
        } else {
            Err(InvalidRequest::NotCloneable(species.to_string()))
        }
    }

    /// Must-contain gimmicks, and the gimmicks an ally hit chance depends on.
    fn check_required_gimmicks(
        &self,
        gimmick_ids: &[&str],
        ally_hit: Option<u32>,
    ) -> Result<(), InvalidRequest> {
        let all = &self.must_contain.all;
        if !all.is_empty() && !all.iter().all(|id| gimmick_ids.contains(&id.as_str())) {
            return Err(InvalidRequest::MustContainAll(self.alias_list(all).join(", ")));
        }
        let any = &self.must_contain.any;
        if !any.is_empty() && !any.iter().any(|id| gimmick_ids.contains(&id.as_str())) {
            return Err(InvalidRequest::MustContainAny(self.alias_list(any).join(", ")));
        }

        let required = &self.config.bid_rules.ally_hit_requires;
        if ally_hit.is_some() && !required.iter().all(|id| gimmick_ids.contains(&id.as_str())) {
            return Err(InvalidRequest::AllyHitRequires(stringify_list(
                &self.alias_list(required),
            )));
        }
        Ok(())
    }

    fn alias_list(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .map(|id| self.restrictions.alias_or_id(id).to_string())
            .collect()
    }

    // --- Lookups for callers ---

    /// Configured cooldown of a mode, or of the synthetic team size ids.
    pub fn get_cooldown(&self, id: &str) -> u32 {
        match id {
            UNEVEN_TEAMS => self.config.uneven_teams_cooldown,
            LARGE_TEAMS => self.config.large_teams_cooldown,
            _ => match self.find_mode(id) {
                Some(mode) => mode.info().cooldown,
                None => {
                    error!("Cooldown requested for mode {}, which was not found", id);
                    0
                }
            },
        }
    }

    fn find_mode(&self, id: &str) -> Option<&Arc<Mode>> {
        self.metagames.get(id).or_else(|| self.gimmicks.get(id))
    }

    /// Base modes that may be bid, in registry order. Modes without an alias
    /// and the normal gimmick are left out.
    pub fn list_biddable_modes(&self) -> (Vec<&Arc<Mode>>, Vec<&Arc<Mode>>) {
        let biddable = |mode: &&Arc<Mode>| mode.is_biddable() && mode.first_bid_alias().is_some();
        let metagames = self.metagames.base_modes().filter(biddable).collect();
        let gimmicks = self
            .gimmicks
            .base_modes()
            .filter(|mode| mode.id() != NORMAL_GIMMICK)
            .filter(biddable)
            .collect();
        (metagames, gimmicks)
    }

    /// Help entries keyed by every alias and emoji of every base mode.
    pub fn mode_info_by_alias(&self) -> BTreeMap<String, ModeHelp> {
        let mut result = BTreeMap::new();
        for mode in self.metagames.base_modes().chain(self.gimmicks.base_modes()) {
            let info = mode.info();
            let help = ModeHelp {
                display_name: info.display_name.clone(),
                description: info.description.clone(),
                bid_alias: mode.first_bid_alias_or_id(true),
                family: info.family,
            };
            for alias in &info.bid_aliases {
                result.insert(alias.clone(), help.clone());
            }
            if let Some(emoji) = &info.emoji {
                result.insert(emoji.clone(), help.clone());
            }
        }
        result
    }

    pub fn id_to_first_alias(&self) -> BTreeMap<String, String> {
        let mut aliases = self.metagames.id_to_first_alias();
        aliases.extend(self.gimmicks.id_to_first_alias());
        aliases
    }

    /// Serialized restriction graph followed by the rarity tables. Equal
    /// configurations always produce equal bytes.
    pub fn fingerprint(&self) -> Result<Vec<u8>, postcard::Error> {
        let mut bytes = self.restrictions.to_bytes()?;
        bytes.extend(self.rarities.to_bytes()?);
        Ok(bytes)
    }
}

fn base_or_composite<'a>(collection: &'a ModeCollection, id: &str) -> ResolutionResult<&'a Arc<Mode>> {
    collection
        .get(id)
        .ok_or_else(|| ResolutionError::UnknownMode(id.to_string()))
}

fn base_mode(collection: &ModeCollection, id: &str) -> ResolutionResult<Arc<Mode>> {
    collection
        .get_base(id)
        .cloned()
        .ok_or_else(|| ResolutionError::UnknownMode(id.to_string()))
}

fn push_unique(modes: &mut Vec<Arc<Mode>>, mode: &Arc<Mode>) {
    if !modes.iter().any(|m| m.id() == mode.id()) {
        modes.push(Arc::clone(mode));
    }
}

fn sort_modes(collection: &ModeCollection, modes: &mut [Arc<Mode>]) {
    modes.sort_by_key(|mode| collection.position(mode.id()).unwrap_or(usize::MAX));
}

/// Splits the requested modes of one family into a primary mode and its base
/// modes. The primary is `None` when several base modes were requested and no
/// biddable composite is made of exactly those.
fn split_modes<R: Rng + ?Sized>(
    collection: &ModeCollection,
    requested: &[Arc<Mode>],
    default_id: &str,
    rng: &mut R,
) -> Result<SplitModes, InvalidRequest> {
    match requested {
        [] => {
            let default = collection
                .get_base(default_id)
                .ok_or_else(|| InvalidRequest::ModeNotExisting(default_id.to_string()))?;
            Ok((Some(Arc::clone(default)), vec![Arc::clone(default)]))
        }
        [single] => match single.composition() {
            None => Ok((Some(Arc::clone(single)), vec![Arc::clone(single)])),
            Some(composition) => {
                if composition.has_wildcard() {
                    return Err(InvalidRequest::WildcardComposite(
                        single.first_bid_alias_or_id(false),
                    ));
                }
                let mut bases = composition
                    .fixed_ids()
                    .map(|id| {
                        collection
                            .get_base(id)
                            .cloned()
                            .ok_or_else(|| InvalidRequest::ModeNotExisting(id.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if composition.kind == CompositeKind::VersusMix {
                    bases.shuffle(rng);
                    bases.truncate(2);
                }
                Ok((Some(Arc::clone(single)), bases))
            }
        },
        many => {
            if let Some(composite) = many.iter().find(|mode| mode.is_composite()) {
                return Err(InvalidRequest::CompositeNotAlone {
                    alias: composite.first_bid_alias_or_id(false),
                    family: collection.family(),
                });
            }
            let ids: Vec<&str> = many.iter().map(|mode| mode.id()).collect();
            let primary = collection.biddable_combo_for(&ids).cloned();
            Ok((primary, many.to_vec()))
        }
    }
}
