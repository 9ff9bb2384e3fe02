use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;

/// Synthetic id put on cooldown after a match with uneven teams.
pub const UNEVEN_TEAMS: &str = "_uneventeams";
/// Synthetic id put on cooldown after a match above the team size soft limit.
pub const LARGE_TEAMS: &str = "_largeteams";

/// Remaining cooldown, in token matches, of every mode that is cooling down.
///
/// The tracker is owned by the caller and passed to each bid resolution. It
/// only changes when [`CooldownTracker::tick`] is called after a match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CooldownTracker {
    remaining: BTreeMap<String, u32>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches left before `id` may be bid again. Zero when it is not cooling.
    pub fn remaining(&self, id: &str) -> u32 {
        self.remaining.get(id).copied().unwrap_or(0)
    }

    pub fn is_cooling(&self, id: &str) -> bool {
        self.remaining(id) > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.remaining.iter().map(|(id, left)| (id.as_str(), *left))
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Sets the cooldown of `id` directly, dropping it when `matches` is zero.
    pub fn set(&mut self, id: &str, matches: u32) {
        if matches == 0 {
            self.remaining.remove(id);
        } else {
            self.remaining.insert(id.to_string(), matches);
        }
    }

    /// Advances every cooldown by `ticks` matches, then starts the cooldown of
    /// each played id. `cooldown_of` gives the configured length of an id.
    pub fn tick<S, F>(&mut self, played: &[S], ticks: u32, cooldown_of: F)
    where
        S: AsRef<str>,
        F: Fn(&str) -> u32,
    {
        for id in played {
            let id = id.as_ref();
            if self.is_cooling(id) {
                error!(
                    "Mode {} played when it should have been on cooldown. Cooldowns: {:?}",
                    id, self.remaining
                );
            }
        }

        self.remaining.retain(|id, left| {
            if *left < 1 {
                error!("Mode {} had a cooldown below 1", id);
            }
            if *left <= ticks.max(1) {
                return false;
            }
            *left -= ticks;
            true
        });

        for id in played {
            let id = id.as_ref();
            let cooldown = cooldown_of(id);
            if cooldown > 0 {
                self.remaining.insert(id.to_string(), cooldown);
            }
        }
    }
}
