//! Parsing of match bid commands.
//!
//! A bid reads `<modes> <team1>/<team2>` where the modes are separated by
//! whitespace and each team is a comma separated roster. Both parts are
//! optional. Besides mode aliases, the mode part may hold a team size such as
//! `3v3`, an ally hit chance such as `40%allyhit` and a battle timer such as
//! `5min` or `randomtimer`.

use crate::errors::InvalidRequest;
use crate::resolver::BidRequest;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static BID_WITH_TEAMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?P<modes>[^,-/]+)\s+)?(?:(?P<team1>[^/]+)/(?P<team2>[^/]+))?(?P<unrecognized>.*)$",
    )
    .expect("valid regex")
});

static MODES_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?P<modes>[^,]+)\s+)?(?P<unrecognized>.*)$").expect("valid regex")
});

static TEAM_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([1-6])(?:v|vs)([1-6])").expect("valid regex"));

static ALLY_HIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)%?ally(?:hit|target)").expect("valid regex"));

static BATTLE_TIMER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)(?:min|minute|minutes)").expect("valid regex"));

const RANDOM_TIMER_TOKENS: [&str; 5] = [
    "randommin",
    "randomtimer",
    "randomtimed",
    "randombattletimer",
    "randombattletime",
];

const TIMER_MODE_TOKENS: [&str; 2] = ["timed", "timer"];

pub const ALLY_HIT_MAX: u32 = 100;
pub const BATTLE_TIMER_MINUTES: std::ops::RangeInclusive<u32> = 1..=15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleTimer {
    Minutes(u32),
    Random,
}

/// A bid command split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedBid {
    /// Remaining mode tokens, in the order they were typed.
    pub mode_tokens: Vec<String>,
    pub teams: Option<[Vec<String>; 2]>,
    pub team_sizes: Option<(u8, u8)>,
    pub ally_hit: Option<u32>,
    pub battle_timer: Option<BattleTimer>,
    /// Text the bid grammar could not place. A valid bid leaves this empty.
    pub unrecognized: String,
}

impl ParsedBid {
    /// Team sizes as requested, or as implied by the rosters.
    pub fn sizes(&self) -> Option<(usize, usize)> {
        match (&self.team_sizes, &self.teams) {
            (Some((a, b)), _) => Some((*a as usize, *b as usize)),
            (None, Some([blue, red])) => Some((blue.len(), red.len())),
            (None, None) => None,
        }
    }

    /// The part of the bid the mode resolver consumes.
    pub fn to_request(&self) -> BidRequest {
        BidRequest {
            tokens: self.mode_tokens.clone(),
            teams_specified: self.teams.is_some(),
            ally_hit: self.ally_hit,
        }
    }
}

/// Splits a bid command into modes, rosters and the special tokens.
///
/// When the bid sets a battle timer but names no timer gimmick,
/// `timer_mode` is appended to the mode tokens.
pub fn parse_bid(command: &str, timer_mode: &str) -> Result<ParsedBid, InvalidRequest> {
    let padded = format!("{} ", command.trim_start());
    let pattern = if padded.contains('/') {
        &*BID_WITH_TEAMS
    } else {
        &*MODES_ONLY
    };
    let Some(captures) = pattern.captures(&padded) else {
        return Ok(ParsedBid {
            unrecognized: command.to_string(),
            ..Default::default()
        });
    };

    let mut bid = ParsedBid {
        mode_tokens: captures
            .name("modes")
            .map(|m| m.as_str().split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        unrecognized: captures
            .name("unrecognized")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        ..Default::default()
    };
    if let (Some(team1), Some(team2)) = (captures.name("team1"), captures.name("team2")) {
        bid.teams = Some([split_roster(team1.as_str()), split_roster(team2.as_str())]);
    }

    if let Some(index) = bid.mode_tokens.iter().position(|t| TEAM_SIZE.is_match(t)) {
        let token = bid.mode_tokens.remove(index);
        bid.team_sizes = TEAM_SIZE
            .captures(&token)
            .and_then(|c| Some((c[1].parse().ok()?, c[2].parse().ok()?)));
    }

    if let Some(index) = bid.mode_tokens.iter().position(|t| ALLY_HIT.is_match(t)) {
        let token = bid.mode_tokens.remove(index);
        let percentage = leading_number(&ALLY_HIT, &token);
        if percentage > ALLY_HIT_MAX {
            return Err(InvalidRequest::AllyHitOutOfRange(percentage));
        }
        bid.ally_hit = Some(percentage);
    }

    if let Some(index) = bid.mode_tokens.iter().position(|t| is_timer_token(t)) {
        let token = bid.mode_tokens.remove(index);
        if RANDOM_TIMER_TOKENS.contains(&token.to_lowercase().as_str()) {
            bid.battle_timer = Some(BattleTimer::Random);
        } else {
            let minutes = leading_number(&BATTLE_TIMER, &token);
            if !BATTLE_TIMER_MINUTES.contains(&minutes) {
                return Err(InvalidRequest::BattleTimerOutOfRange(minutes));
            }
            bid.battle_timer = Some(BattleTimer::Minutes(minutes));
        }
    }

    if bid.battle_timer.is_some()
        && !bid
            .mode_tokens
            .iter()
            .any(|t| TIMER_MODE_TOKENS.contains(&t.to_lowercase().as_str()))
    {
        bid.mode_tokens.push(timer_mode.to_string());
    }

    if let (Some((size1, size2)), Some([blue, red])) = (bid.team_sizes, &bid.teams) {
        if size1 as usize != blue.len() || size2 as usize != red.len() {
            return Err(InvalidRequest::TeamSizeMismatch);
        }
    }

    Ok(bid)
}

fn is_timer_token(token: &str) -> bool {
    RANDOM_TIMER_TOKENS.contains(&token.to_lowercase().as_str()) || BATTLE_TIMER.is_match(token)
}

fn split_roster(roster: &str) -> Vec<String> {
    roster.split(',').map(|p| p.trim().to_string()).collect()
}

/// First capture of `pattern` in `token` as a number. Values too large for a
/// `u32` saturate so that range checks reject them.
fn leading_number(pattern: &Regex, token: &str) -> u32 {
    pattern
        .captures(token)
        .map(|c| c[1].parse().unwrap_or(u32::MAX))
        .unwrap_or(u32::MAX)
}
