//! The matchmaker: turns an event configuration into playable match plans,
//! either rolled automatically or built from a bid, and keeps the cooldowns
//! of recently played modes.

use crate::bid::{parse_bid, BattleTimer, ParsedBid};
use crate::config::ConfigSet;
use crate::cooldowns::{CooldownTracker, LARGE_TEAMS, UNEVEN_TEAMS};
use crate::errors::{
    ConfigError, ConfigResult, InvalidRequest, MatchmakerResult, SettingsError, SettingsResult,
};
use crate::modes::{stringify_list, MatchMode, Mode};
use crate::resolver::ModeResolver;
use crate::rotation::Rotation;
use crate::selection::weighted_select;
use crate::settings::{
    ally_hit_choice, ally_hit_percent, battle_timer_choice, battle_timer_minutes, MatchSettings,
    SettingValue, SwitchingSetting, TeamSizeTable,
};
use ordered_float::OrderedFloat;
use rand::Rng;
use schema::{MatchmakerConfig, RawSettings, SettingName, TeamScope, TeamSizeRule};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Attempts made by [`Matchmaker::make`] when the caller has no preference.
pub const DEFAULT_RETRIES: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Switching {
    On,
    Off,
    Special,
}

/// Settings of one match after every random choice has been made.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalSettings {
    pub switching: Switching,
    pub bet_bonus: f64,
    pub ally_hit: Option<u32>,
    pub battle_timer: Option<BattleTimer>,
    /// The merged bundle the values above were resolved from.
    pub merged: MatchSettings,
}

/// Everything needed to set up one match, short of the Pokémon themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPlan {
    pub metagame: MatchMode,
    pub gimmick: MatchMode,
    pub settings: FinalSettings,
    /// Rosters named by the bid, blue team first.
    pub teams: Option<[Vec<String>; 2]>,
    pub team_sizes: Option<(u8, u8)>,
}

impl MatchPlan {
    pub fn is_uneven(&self) -> bool {
        self.team_sizes.is_some_and(|(blue, red)| blue != red)
    }

    /// Ids whose cooldown starts once this match has been played.
    pub fn played_ids(&self, team_size_soft_limit: u8) -> Vec<String> {
        let mut ids: Vec<String> = self
            .metagame
            .base_ids()
            .into_iter()
            .chain(self.gimmick.base_ids())
            .map(str::to_string)
            .collect();
        if let Some((blue, red)) = self.team_sizes {
            if blue != red {
                ids.push(UNEVEN_TEAMS.to_string());
            }
            if blue > team_size_soft_limit || red > team_size_soft_limit {
                ids.push(LARGE_TEAMS.to_string());
            }
        }
        ids
    }
}

/// `gen1 clone Mew switching (35% bonus)`
impl fmt::Display for MatchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modes = self.metagame.base_first_bid_aliases_or_ids(true);
        let mut gimmicks = self.gimmick.base_first_bid_aliases_or_ids(true);
        if let Some(target) = self.gimmick.clone_target() {
            for alias in gimmicks.iter_mut().filter(|alias| alias.starts_with("clone")) {
                alias.push(' ');
                alias.push_str(target);
            }
        }
        modes.append(&mut gimmicks);
        if self.settings.switching == Switching::On {
            modes.push("switching".to_string());
        }
        write!(f, "{} ({}% bonus)", modes.join(" "), self.settings.bet_bonus)
    }
}

/// The named settings bundles of `settings.ron`, decoded once.
#[derive(Debug, Clone, Default, PartialEq)]
struct MergeableBundles {
    default: MatchSettings,
    team_choice: MatchSettings,
    one_move_per_pokemon: MatchSettings,
}

impl MergeableBundles {
    fn from_config(config: &MatchmakerConfig) -> ConfigResult<Self> {
        let decode = |owner: &str, raw: &RawSettings| {
            MatchSettings::from_config(raw).map_err(|source| ConfigError::Settings {
                owner: format!("mergeable.{}", owner),
                source,
            })
        };
        let mergeable = &config.mergeable;
        Ok(Self {
            default: decode("default", &mergeable.default)?,
            team_choice: decode("team_choice", &mergeable.team_choice)?,
            one_move_per_pokemon: decode("one_move_per_pokemon", &mergeable.one_move_per_pokemon)?,
        })
    }
}

pub struct Matchmaker {
    resolver: ModeResolver,
    bundles: MergeableBundles,
    pub rotation: Rotation,
    cooldowns: CooldownTracker,
    /// Ids never drawn by automated matchmaking.
    unselectable: Vec<String>,
    bet_bonus_enabled: bool,
}

impl Matchmaker {
    /// Builds the matchmaker of one event. Draws the first rotation when
    /// rotations are enabled.
    pub fn new<R: Rng + ?Sized>(config_set: &ConfigSet, rng: &mut R) -> MatchmakerResult<Self> {
        let resolver = ModeResolver::new(config_set)?;
        let bundles = MergeableBundles::from_config(resolver.config())?;
        let mut rotation = Rotation::new(&resolver.config().rotations);
        if rotation.enabled {
            rotation.rotate(&resolver, rng)?;
        }
        Ok(Self {
            resolver,
            bundles,
            rotation,
            cooldowns: CooldownTracker::new(),
            unselectable: Vec::new(),
            bet_bonus_enabled: true,
        })
    }

    pub fn resolver(&self) -> &ModeResolver {
        &self.resolver
    }

    pub fn config(&self) -> &MatchmakerConfig {
        self.resolver.config()
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    pub fn cooldowns_mut(&mut self) -> &mut CooldownTracker {
        &mut self.cooldowns
    }

    pub fn set_unselectable_modes(&mut self, ids: Vec<String>) {
        self.unselectable = ids;
    }

    pub fn set_bet_bonus_enabled(&mut self, enabled: bool) {
        self.bet_bonus_enabled = enabled;
    }

    pub fn rotate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> MatchmakerResult<()> {
        self.rotation.rotate(&self.resolver, rng)?;
        Ok(())
    }

    // --- Automated matches ---

    /// Rolls a match, retrying up to `retries_max` times when resolution
    /// fails. Rejected requests are never retried.
    pub fn make<R: Rng + ?Sized>(&self, rng: &mut R, retries_max: u32) -> MatchmakerResult<MatchPlan> {
        info!("Making match.");
        let mut failures = 0;
        loop {
            match self.make_once(rng) {
                Ok(plan) => return Ok(plan),
                Err(err) if err.is_retryable() && failures < retries_max => {
                    failures += 1;
                    error!(
                        "({}/{}) Automated matchmaking failed: {}",
                        failures, retries_max, err
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn make_once<R: Rng + ?Sized>(&self, rng: &mut R) -> MatchmakerResult<MatchPlan> {
        let (metagame, gimmick) = self.select_modes(rng)?;
        info!("Metagame: {}", metagame);
        info!("Gimmick: {}", gimmick);

        let intermediate = self.intermediate_settings(&metagame, &gimmick, false, rng)?;
        let team_sizes = self.draw_team_sizes(&intermediate, &gimmick, rng)?;
        let settings = self.final_settings(intermediate, &gimmick, team_sizes, rng)?;
        let settings = resolve_choices(settings, None, None, rng)?;
        Ok(MatchPlan {
            metagame,
            gimmick,
            settings,
            teams: None,
            team_sizes,
        })
    }

    fn select_modes<R: Rng + ?Sized>(&self, rng: &mut R) -> MatchmakerResult<(MatchMode, MatchMode)> {
        let forbidden: Vec<&str> = self.unselectable.iter().map(String::as_str).collect();
        if !self.rotation.enabled {
            return Ok(self.resolver.resolve_automated(&forbidden, rng)?);
        }

        let rotating = if rng.random::<f64>() < self.rotation.gimmick_chance {
            self.rotation.get(rng).cloned()
        } else {
            None
        };
        let gimmick = match rotating {
            Some(gimmick) => gimmick,
            None => self.resolver.make_normal_gimmick(rng)?,
        };
        Ok(self.resolver.resolve_for_gimmick(gimmick, &forbidden, rng)?)
    }

    // --- Bid matches ---

    /// Builds a match from a bid command such as `gen1 speed 3v3`.
    pub fn make_from_bid<R: Rng + ?Sized>(&self, command: &str, rng: &mut R) -> MatchmakerResult<MatchPlan> {
        info!("Making custom match from command: {}", command);
        let config = self.config();
        let parsed = parse_bid(command, &config.bid_rules.battle_timer_mode)?;
        if !parsed.unrecognized.is_empty() {
            return Err(InvalidRequest::Malformed.into());
        }
        debug!(
            "Bid modes detected: {:?}, bid teams detected: {:?}",
            parsed.mode_tokens, parsed.teams
        );

        let sizes = requested_sizes(&parsed)?;
        self.check_team_size_cooldowns(sizes)?;

        let (metagame, gimmick) =
            self.resolver
                .resolve_from_bid(&parsed.to_request(), &self.cooldowns, rng)?;
        info!("Metagame: {}", metagame);
        info!("Gimmick: {}", gimmick);

        if let Some(reason) = sizes.and_then(|sizes| self.team_size_violation(&gimmick, sizes)) {
            return Err(reason.into());
        }

        let teams_specified = parsed.teams.is_some();
        let intermediate = self.intermediate_settings(&metagame, &gimmick, teams_specified, rng)?;
        let team_sizes = match sizes {
            Some(sizes) => {
                validate_team_sizes(&intermediate, sizes)?;
                Some(sizes)
            }
            None => self.draw_team_sizes(&intermediate, &gimmick, rng)?,
        };

        let mut settings = self.final_settings(intermediate, &gimmick, team_sizes, rng)?;
        if !teams_specified {
            settings.bet_bonus = self.multi_mode_ceiling(&metagame, &gimmick, settings.bet_bonus);
        }
        let settings = resolve_choices(settings, parsed.ally_hit, parsed.battle_timer, rng)?;

        Ok(MatchPlan {
            metagame,
            gimmick,
            settings,
            teams: parsed.teams,
            team_sizes,
        })
    }

    fn check_team_size_cooldowns(&self, sizes: Option<(u8, u8)>) -> Result<(), InvalidRequest> {
        let Some((blue, red)) = sizes else {
            return Ok(());
        };
        let limit = self.config().team_size_soft_limit;
        let uneven = self.cooldowns.remaining(UNEVEN_TEAMS);
        if blue != red && uneven > 0 {
            return Err(InvalidRequest::UnevenTeamsCooling(uneven));
        }
        let large = self.cooldowns.remaining(LARGE_TEAMS);
        if (blue > limit || red > limit) && large > 0 {
            return Err(InvalidRequest::LargeTeamsCooling {
                limit,
                remaining: large,
            });
        }
        Ok(())
    }

    /// The first reason these team sizes may not be played with `gimmick`.
    fn team_size_violation(&self, gimmick: &MatchMode, sizes: (u8, u8)) -> Option<InvalidRequest> {
        let config = self.config();
        for rule in &config.bid_rules.team_size_rules {
            if let Some(violation) = violated_rule(rule, gimmick.base_modes(), sizes) {
                return Some(InvalidRequest::TeamSizeForbidden {
                    alias: violation.mode.first_bid_alias_or_id(false),
                    scope: violation.scope,
                    comparison: violation.comparison,
                    limit: violation.limit,
                });
            }
        }

        let species = gimmick.clone_target()?;
        let limit = *config
            .restrictions
            .token_matchmaking
            .clone_rules
            .max_team_sizes
            .get(species)?;
        let (blue, red) = sizes;
        (blue > limit || red > limit).then(|| InvalidRequest::CloneTeamSizeForbidden {
            species: species.to_string(),
            limit,
        })
    }

    /// Caps the bet bonus of a bid that names several modes of one family
    /// without naming rosters.
    fn multi_mode_ceiling(&self, metagame: &MatchMode, gimmick: &MatchMode, bet_bonus: f64) -> f64 {
        let ceilings = &self.config().multi_mode_ceilings;
        let counted = |mode: &MatchMode| {
            mode.base_ids()
                .into_iter()
                .filter(|id| !ceilings.ignore.contains(*id))
                .count()
        };
        if counted(metagame) <= 1 && counted(gimmick) <= 1 {
            return bet_bonus;
        }

        if gimmick
            .base_ids()
            .iter()
            .any(|id| ceilings.full_exemptions.contains(*id))
        {
            return bet_bonus;
        }

        let subset_exempt = ceilings
            .subset_exemption_gimmick
            .as_deref()
            .is_some_and(|id| gimmick.has_base(id))
            && gimmick.clone_target().is_none()
            && metagame
                .base_ids()
                .iter()
                .all(|id| ceilings.defiance_subset_exemptions.contains_key(*id));
        if subset_exempt {
            return metagame
                .base_ids()
                .iter()
                .filter_map(|id| ceilings.defiance_subset_exemptions.get(*id))
                .fold(bet_bonus, |lowest, bonus| lowest.min(*bonus));
        }
        ceilings.default
    }

    // --- Settings ---

    /// Default bundle, metagame and gimmick settings, and the team choice
    /// bundle when the bid names rosters.
    fn intermediate_settings<R: Rng + ?Sized>(
        &self,
        metagame: &MatchMode,
        gimmick: &MatchMode,
        teams_specified: bool,
        rng: &mut R,
    ) -> SettingsResult<MatchSettings> {
        let mut bundles = vec![
            &self.bundles.default,
            &metagame.match_settings,
            &gimmick.match_settings,
        ];
        if teams_specified {
            bundles.push(&self.bundles.team_choice);
        }
        MatchSettings::merge(&bundles, rng)
    }

    /// Draws team sizes from the merged table, skipping sizes the team size
    /// rules forbid for this gimmick. `None` when no table is configured.
    fn draw_team_sizes<R: Rng + ?Sized>(
        &self,
        settings: &MatchSettings,
        gimmick: &MatchMode,
        rng: &mut R,
    ) -> SettingsResult<Option<(u8, u8)>> {
        let Some(table) = settings.team_sizes() else {
            return Ok(None);
        };
        let candidates: Vec<((u8, u8), f64)> = table
            .iter()
            .filter(|(sizes, _)| self.team_size_violation(gimmick, **sizes).is_none())
            .map(|(sizes, entry)| (*sizes, entry.rarity.into_inner()))
            .collect();
        weighted_select(&candidates, rng)
            .copied()
            .map(Some)
            .ok_or(SettingsError::NoTeamSizes)
    }

    /// Rolls switching and derives the bet bonus from it.
    fn final_settings<R: Rng + ?Sized>(
        &self,
        merged: MatchSettings,
        gimmick: &MatchMode,
        team_sizes: Option<(u8, u8)>,
        rng: &mut R,
    ) -> MatchmakerResult<FinalSettings> {
        let switching = select_switching(
            merged.value(SettingName::Switching),
            gimmick.switching_requested(),
            rng,
        )?;

        let mut bet_bonus = merged.number(SettingName::BetBonus).unwrap_or(0.0);
        if switching == Switching::On {
            if let Some(bonus) = merged.number(SettingName::SwitchingBetBonus) {
                bet_bonus = bonus;
            }
        }
        let uneven = team_sizes.is_some_and(|(blue, red)| blue != red);
        if gimmick.clone_target().is_some() || !self.bet_bonus_enabled || uneven {
            bet_bonus = 0.0;
        }

        Ok(FinalSettings {
            switching,
            bet_bonus,
            ally_hit: None,
            battle_timer: None,
            merged,
        })
    }

    /// Merges the one-move-per-Pokémon bundle into a plan whose switching is
    /// off. Called by whoever instantiates the rosters, once every Pokémon is
    /// known to have a single move.
    pub fn apply_one_move_per_pokemon<R: Rng + ?Sized>(
        &self,
        plan: &mut MatchPlan,
        rng: &mut R,
    ) -> SettingsResult<()> {
        if plan.settings.switching != Switching::Off {
            return Ok(());
        }
        plan.settings.merged =
            MatchSettings::merge(&[&plan.settings.merged, &self.bundles.one_move_per_pokemon], rng)?;
        Ok(())
    }

    // --- After a match ---

    /// Advances the cooldowns after `plan` was played.
    pub fn finish_match(&mut self, plan: &MatchPlan, ticks: u32) {
        let played = plan.played_ids(self.config().team_size_soft_limit);
        let resolver = &self.resolver;
        self.cooldowns
            .tick(&played, ticks, |id| resolver.get_cooldown(id));
        debug!("Cooldowns after match: {:?}", self.cooldowns);
    }

    /// Advances the cooldowns without starting any new one.
    pub fn tick_cooldowns(&mut self, ticks: u32) {
        let resolver = &self.resolver;
        self.cooldowns
            .tick::<&str, _>(&[], ticks, |id| resolver.get_cooldown(id));
    }

    /// Biddable metagames and gimmicks as readable lists, each alias followed
    /// by its remaining cooldown when it has one.
    pub fn pretty_biddable_modes(&self) -> (String, String) {
        let (metagames, gimmicks) = self.resolver.list_biddable_modes();
        let pretty = |modes: Vec<&Arc<Mode>>| {
            let entries: Vec<String> = modes
                .iter()
                .map(|mode| {
                    let alias = mode.first_bid_alias_or_id(true);
                    match self.cooldowns.remaining(mode.id()) {
                        0 => alias,
                        left => format!("{}({}-tokenmatch cooldown)", alias, left),
                    }
                })
                .collect();
            stringify_list(&entries)
        };
        (pretty(metagames), pretty(gimmicks))
    }
}

/// Team sizes the bid asked for, directly or through its rosters.
fn requested_sizes(parsed: &ParsedBid) -> Result<Option<(u8, u8)>, InvalidRequest> {
    let Some((blue, red)) = parsed.sizes() else {
        return Ok(None);
    };
    match (u8::try_from(blue), u8::try_from(red)) {
        (Ok(blue), Ok(red)) => Ok(Some((blue, red))),
        _ => Err(InvalidRequest::InvalidTeamSize),
    }
}

fn validate_team_sizes(settings: &MatchSettings, sizes: (u8, u8)) -> Result<(), InvalidRequest> {
    let allowed = settings
        .team_sizes()
        .and_then(|table: &TeamSizeTable| table.get(&sizes))
        .is_some_and(|entry| entry.biddable);
    if allowed {
        Ok(())
    } else {
        Err(InvalidRequest::InvalidTeamSize)
    }
}

struct RuleViolation<'a> {
    mode: &'a Arc<Mode>,
    scope: &'static str,
    comparison: &'static str,
    limit: u8,
}

/// The first base gimmick a rule forbids at these sizes, with the violated
/// comparison and limit.
fn violated_rule<'a>(
    rule: &TeamSizeRule,
    base_modes: &'a [Arc<Mode>],
    (blue, red): (u8, u8),
) -> Option<RuleViolation<'a>> {
    let mode = base_modes
        .iter()
        .find(|mode| rule.gimmicks.iter().any(|id| id.as_str() == mode.id()))?;
    let scope = match rule.applies_to {
        TeamScope::Any => "a team",
        TeamScope::All => "every team",
    };
    let violation = |comparison, limit| RuleViolation {
        mode,
        scope,
        comparison,
        limit,
    };
    if let Some(min) = rule.min_size {
        if rule.applies_to.holds(blue < min, red < min) {
            return Some(violation("fewer than", min));
        }
    }
    if let Some(max) = rule.max_size {
        if rule.applies_to.holds(blue > max, red > max) {
            return Some(violation("more than", max));
        }
    }
    None
}

/// Final switching state. A bid that asks for switching needs a chance above
/// zero; one that asks against it always gets it off.
fn select_switching<R: Rng + ?Sized>(
    value: Option<&SettingValue>,
    requested: Option<bool>,
    rng: &mut R,
) -> Result<Switching, InvalidRequest> {
    match value {
        Some(SettingValue::Switching(SwitchingSetting::Chance(chance))) => match requested {
            Some(true) if chance.into_inner() > 0.0 => Ok(Switching::On),
            Some(true) => Err(InvalidRequest::SwitchingNotPermitted),
            Some(false) => Ok(Switching::Off),
            None if chance.into_inner() < rng.random::<f64>() => Ok(Switching::Off),
            None => Ok(Switching::On),
        },
        _ if requested == Some(true) => Err(InvalidRequest::SwitchingNotPermitted),
        Some(SettingValue::Switching(SwitchingSetting::Special)) => Ok(Switching::Special),
        Some(SettingValue::Switching(SwitchingSetting::PermanentlyDisabled)) | None => {
            Ok(Switching::Off)
        }
        Some(other) => {
            error!("Didn't recognize switching value: {:?}", other);
            Ok(Switching::Off)
        }
    }
}

/// Resolves the ally hit chance and the battle timer. Values from the bid win
/// over configured ones.
fn resolve_choices<R: Rng + ?Sized>(
    mut settings: FinalSettings,
    bid_ally_hit: Option<u32>,
    bid_battle_timer: Option<BattleTimer>,
    rng: &mut R,
) -> MatchmakerResult<FinalSettings> {
    settings.ally_hit = match bid_ally_hit {
        Some(percent) => Some(percent),
        None => match settings.merged.value(SettingName::AllyHit) {
            Some(value) => Some(choose_ally_hit(value, rng)?),
            None => None,
        },
    };
    settings.battle_timer = match bid_battle_timer {
        Some(timer) => Some(timer),
        None => match settings.merged.value(SettingName::BattleTimer) {
            Some(value) => Some(choose_battle_timer(value, rng)?),
            None => None,
        },
    };
    Ok(settings)
}

fn choose_ally_hit<R: Rng + ?Sized>(value: &SettingValue, rng: &mut R) -> SettingsResult<u32> {
    let invalid = || invalid_choice(SettingName::AllyHit, value);
    match value {
        SettingValue::Number(percent) => ally_hit_percent(percent.into_inner()).ok_or_else(invalid),
        SettingValue::Weighted(table) => weighted_key(table, rng)
            .and_then(ally_hit_choice)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn choose_battle_timer<R: Rng + ?Sized>(value: &SettingValue, rng: &mut R) -> SettingsResult<BattleTimer> {
    let invalid = || invalid_choice(SettingName::BattleTimer, value);
    match value {
        SettingValue::Number(minutes) => battle_timer_minutes(minutes.into_inner())
            .map(BattleTimer::Minutes)
            .ok_or_else(invalid),
        SettingValue::Text(text) if text == "random" => Ok(BattleTimer::Random),
        SettingValue::Weighted(table) => weighted_key(table, rng)
            .and_then(battle_timer_choice)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn weighted_key<'a, R: Rng + ?Sized>(
    table: &'a BTreeMap<String, OrderedFloat<f64>>,
    rng: &mut R,
) -> Option<&'a str> {
    let entries: Vec<(&str, f64)> = table
        .iter()
        .map(|(key, weight)| (key.as_str(), weight.into_inner()))
        .collect();
    weighted_select(&entries, rng).copied()
}

fn invalid_choice(name: SettingName, value: &SettingValue) -> SettingsError {
    SettingsError::InvalidLiteral {
        name,
        expected: "a choice with a positive weight",
        found: format!("{:?}", value),
    }
}
