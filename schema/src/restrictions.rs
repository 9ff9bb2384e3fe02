use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A blacklisted pair of mode ids, or the cross product of two id lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairSpec {
    Pair(String, String),
    Cross(Vec<String>, Vec<String>),
}

impl PairSpec {
    /// Every (a, b) pair this entry names.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        match self {
            PairSpec::Pair(a, b) => vec![(a.as_str(), b.as_str())],
            PairSpec::Cross(left, right) => left
                .iter()
                .flat_map(|a| right.iter().map(move |b| (a.as_str(), b.as_str())))
                .collect(),
        }
    }
}

/// Limits that apply when a bid names a specific species to clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneRules {
    /// Gimmick id that owns the clone pool.
    pub gimmick: String,
    /// Gimmicks that never count against `max_companions`.
    pub free_companions: BTreeSet<String>,
    pub max_companions: usize,
    pub conflicts: BTreeSet<String>,
    /// Largest team size each species may be cloned for, keyed by species name.
    pub max_team_sizes: BTreeMap<String, u8>,
}

impl Default for CloneRules {
    fn default() -> Self {
        Self {
            gimmick: "clone".to_string(),
            free_companions: BTreeSet::new(),
            max_companions: 1,
            conflicts: BTreeSet::new(),
            max_team_sizes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextRestrictions {
    pub mode_pair_blacklists: Vec<PairSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRestrictions {
    pub mode_pair_blacklists: Vec<PairSpec>,
    pub team_choice_blacklist: BTreeSet<String>,
    pub clone_rules: CloneRules,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestrictionsConfig {
    pub automated_matchmaking: ContextRestrictions,
    pub token_matchmaking: TokenRestrictions,
    pub automated_and_token_matchmaking: ContextRestrictions,
    pub lift_restrictions: Vec<PairSpec>,
}

impl RestrictionsConfig {
    /// Pair lists for the automated context, with the shared list appended and
    /// lifted entries removed.
    pub fn automated_pairs(&self) -> Vec<PairSpec> {
        self.effective(&self.automated_matchmaking.mode_pair_blacklists)
    }

    /// Pair lists for the bid context, with the shared list appended and
    /// lifted entries removed.
    pub fn token_pairs(&self) -> Vec<PairSpec> {
        self.effective(&self.token_matchmaking.mode_pair_blacklists)
    }

    fn effective(&self, own: &[PairSpec]) -> Vec<PairSpec> {
        own.iter()
            .filter(|spec| !self.lift_restrictions.contains(spec))
            .chain(
                self.automated_and_token_matchmaking
                    .mode_pair_blacklists
                    .iter()
                    .filter(|spec| !self.lift_restrictions.contains(spec)),
            )
            .cloned()
            .collect()
    }
}
