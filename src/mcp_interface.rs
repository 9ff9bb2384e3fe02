//! Text front end of the matchmaker, shared by the demo binary and the MCP
//! server.
//!
//! Every function returns the text a chat user would see. Rejected bids come
//! back as a [`BidReply::Rejected`] rather than as errors.

use crate::bid::BattleTimer;
use crate::config::ConfigSet;
use crate::errors::{MatchmakerError, MatchmakerResult};
use crate::matchmaker::{MatchPlan, Matchmaker, Switching, DEFAULT_RETRIES};
use crate::modes::Mode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A matchmaker together with its random source and the match waiting to be
/// played.
pub struct MatchSession {
    matchmaker: Matchmaker,
    rng: StdRng,
    pending: Option<MatchPlan>,
}

impl MatchSession {
    /// Loads the event configuration from `config_dir`. A fixed `seed` makes
    /// every draw reproducible.
    pub fn load(config_dir: impl AsRef<Path>, event_id: &str, seed: Option<u64>) -> MatchmakerResult<Self> {
        let config = ConfigSet::load(config_dir, event_id)?;
        Self::from_config(&config, seed)
    }

    pub fn from_config(config: &ConfigSet, seed: Option<u64>) -> MatchmakerResult<Self> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let matchmaker = Matchmaker::new(config, &mut rng)?;
        Ok(Self {
            matchmaker,
            rng,
            pending: None,
        })
    }

    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    pub fn pending(&self) -> Option<&MatchPlan> {
        self.pending.as_ref()
    }
}

/// Rolls an automated match and keeps it as the pending match.
pub fn roll_match(session: &mut MatchSession) -> MatchmakerResult<String> {
    let plan = session.matchmaker.make(&mut session.rng, DEFAULT_RETRIES)?;
    let text = format!("--- Automated Match ---\n{}", display_plan(&plan));
    session.pending = Some(plan);
    Ok(text)
}

/// Answer to a bid command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidReply {
    Accepted(String),
    /// The bid broke a rule. Holds the reason, meant for the bidder as is.
    Rejected(String),
}

impl BidReply {
    pub fn text(&self) -> &str {
        match self {
            BidReply::Accepted(text) | BidReply::Rejected(text) => text,
        }
    }
}

/// Builds a match from a bid command. A rejected bid leaves the pending match
/// untouched.
pub fn bid_match(session: &mut MatchSession, command: &str) -> MatchmakerResult<BidReply> {
    match session.matchmaker.make_from_bid(command, &mut session.rng) {
        Ok(plan) => {
            let text = format!("--- Bid Accepted ---\n{}", display_plan(&plan));
            session.pending = Some(plan);
            Ok(BidReply::Accepted(text))
        }
        Err(MatchmakerError::InvalidRequest(reason)) => Ok(BidReply::Rejected(reason.to_string())),
        Err(err) => Err(err),
    }
}

/// Marks the pending match as played and advances the cooldowns.
pub fn finish_match(session: &mut MatchSession, ticks: u32) -> String {
    let Some(plan) = session.pending.take() else {
        return "No match is pending. Roll or bid for one first.".to_string();
    };
    session.matchmaker.finish_match(&plan, ticks);
    info!("Finished match: {}", plan);

    let mut output = format!("Finished: {}\n", plan);
    let cooldowns = session.matchmaker.cooldowns();
    if cooldowns.is_empty() {
        output.push_str("Nothing is on cooldown.");
    } else {
        output.push_str("On cooldown:");
        for (id, left) in cooldowns.iter() {
            output.push_str(&format!("\n  {} ({} more)", id, left));
        }
    }
    output
}

pub fn list_biddable_modes(matchmaker: &Matchmaker) -> String {
    let (metagames, gimmicks) = matchmaker.pretty_biddable_modes();
    format!("Metagames: {}\nGimmicks: {}", metagames, gimmicks)
}

/// Help text for one bid alias, with its remaining cooldown.
pub fn mode_info(matchmaker: &Matchmaker, alias: &str) -> String {
    let alias = alias.trim().to_lowercase();
    if alias.is_empty() {
        return "Which mode do you want to look up? (e.g., 'gen1')".to_string();
    }
    let info = matchmaker.resolver().mode_info_by_alias();
    let Some(help) = info.get(&alias) else {
        return format!("The mode '{}' was not found.", alias);
    };

    let mut output = format!(
        "--- {} ({}) ---\nBid with: {}\n{}",
        help.display_name, help.family, help.bid_alias, help.description
    );
    let cooling = remaining_cooldown(matchmaker, &alias).unwrap_or(0);
    if cooling > 0 {
        output.push_str(&format!("\nOn cooldown for {} more token matches.", cooling));
    }
    output
}

/// Configured and remaining cooldown of the mode a bid alias names.
pub fn mode_cooldown(matchmaker: &Matchmaker, alias: &str) -> String {
    let alias = alias.trim().to_lowercase();
    let resolver = matchmaker.resolver();
    let Some(mode) = find_by_alias(matchmaker, &alias) else {
        return format!("The mode '{}' was not found.", alias);
    };
    let configured = resolver.get_cooldown(mode.id());
    match matchmaker.cooldowns().remaining(mode.id()) {
        0 => format!("{} is available (cooldown after play: {}).", alias, configured),
        left => format!(
            "{} is on cooldown for {} more token matches (cooldown after play: {}).",
            alias, left, configured
        ),
    }
}

fn find_by_alias<'a>(matchmaker: &'a Matchmaker, alias: &str) -> Option<&'a Arc<Mode>> {
    let resolver = matchmaker.resolver();
    resolver
        .metagames()
        .get_by_alias(alias)
        .or_else(|| resolver.gimmicks().get_by_alias(alias))
}

fn remaining_cooldown(matchmaker: &Matchmaker, alias: &str) -> Option<u32> {
    find_by_alias(matchmaker, alias).map(|mode| matchmaker.cooldowns().remaining(mode.id()))
}

/// Multi-line description of a match plan.
pub fn display_plan(plan: &MatchPlan) -> String {
    let mut output = format!("{}\n", plan);
    output.push_str(&format!("  Metagame: {}\n", plan.metagame));
    output.push_str(&format!("  Gimmick: {}\n", plan.gimmick));
    if let Some((blue, red)) = plan.team_sizes {
        output.push_str(&format!("  Teams: {}v{}\n", blue, red));
    }
    if let Some([blue, red]) = &plan.teams {
        output.push_str(&format!("  Blue: {}\n  Red: {}\n", blue.join(", "), red.join(", ")));
    }
    let switching = match plan.settings.switching {
        Switching::On => "on",
        Switching::Off => "off",
        Switching::Special => "special",
    };
    output.push_str(&format!("  Switching: {}\n", switching));
    if let Some(percent) = plan.settings.ally_hit {
        output.push_str(&format!("  Ally hit: {}%\n", percent));
    }
    match plan.settings.battle_timer {
        Some(BattleTimer::Minutes(minutes)) => {
            output.push_str(&format!("  Battle timer: {} min\n", minutes))
        }
        Some(BattleTimer::Random) => output.push_str("  Battle timer: random\n"),
        None => {}
    }
    output.push_str(&format!("  Bet bonus: {}%", plan.settings.bet_bonus));
    output
}
