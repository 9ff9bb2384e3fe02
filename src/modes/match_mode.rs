use crate::errors::{ResolutionError, ResolutionResult};
use crate::modes::categories::{category_tags, merge_categories, Categories};
use crate::modes::mode::{CompositeKind, Mode};
use crate::settings::MatchSettings;
use rand::Rng;
use schema::Family;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Joins names in natural language: `A`, `A and B`, `A, B and C`.
pub fn stringify_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(|item| item.as_ref()).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetagameDetails {
    pub set_tags: Vec<String>,
    /// One base metagame is assigned to each team.
    pub is_versus: bool,
    pub versus_tags: Option<Vec<String>>,
    pub rarify_shinies: bool,
    pub allow_duplicate_pokesets: bool,
    pub allow_duplicate_team_species: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GimmickDetails {
    pub categories: Categories,
    /// Tags of every tagged category, exported for the battle setup.
    pub tags: Vec<String>,
    /// Species a bid asked the clone gimmick to use.
    pub clone_target: Option<String>,
    /// `Some` when a bid explicitly asked for switching on or off.
    pub switching_requested: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchDetails {
    Metagame(MetagameDetails),
    Gimmick(GimmickDetails),
}

/// Options a bid attaches to the gimmick it resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GimmickRequest {
    pub clone_target: Option<String>,
    pub switching_requested: Option<bool>,
}

/// The mode selection of one match: a primary mode and the base modes it
/// expands to, in registry order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchMode {
    primary: Arc<Mode>,
    base_modes: Vec<Arc<Mode>>,
    pub match_settings: MatchSettings,
    pub description: String,
    pub details: MatchDetails,
}

impl MatchMode {
    /// Materializes `primary` over the given base modes.
    ///
    /// Composite settings are the merge of every base mode's settings and the
    /// composite's own. The description falls back to a template per composite
    /// kind when the composite has none of its own.
    pub fn make<R: Rng + ?Sized>(
        primary: &Arc<Mode>,
        base_modes: Vec<Arc<Mode>>,
        request: GimmickRequest,
        rng: &mut R,
    ) -> ResolutionResult<Self> {
        validate_base_modes(primary, &base_modes)?;

        let info = primary.info();
        let display_names: Vec<&str> = base_modes.iter().map(|m| m.display_name()).collect();
        let (match_settings, description) = match primary.composition() {
            None => (info.match_settings.clone(), info.description.clone()),
            Some(composition) => {
                let mut bundles: Vec<&MatchSettings> =
                    base_modes.iter().map(|m| &m.info().match_settings).collect();
                bundles.push(&info.match_settings);
                let merged = MatchSettings::merge(&bundles, rng)?;
                let description = if !info.description.is_empty() {
                    info.description.clone()
                } else {
                    generated_description(composition.kind, &display_names)
                };
                (merged, description)
            }
        };

        let details = match info.family {
            Family::Metagame => MatchDetails::Metagame(metagame_details(primary, &base_modes)),
            Family::Gimmick => {
                let categories = match primary.composition() {
                    None => primary.categories().cloned().unwrap_or_default(),
                    Some(_) => merge_categories(base_modes.iter().filter_map(|m| m.categories()))?,
                };
                MatchDetails::Gimmick(GimmickDetails {
                    tags: category_tags(&categories),
                    categories,
                    clone_target: request.clone_target,
                    switching_requested: request.switching_requested,
                })
            }
        };

        Ok(Self {
            primary: Arc::clone(primary),
            base_modes,
            match_settings,
            description,
            details,
        })
    }

    pub fn primary(&self) -> &Mode {
        &self.primary
    }

    pub fn primary_id(&self) -> &str {
        self.primary.id()
    }

    pub fn display_name(&self) -> &str {
        self.primary.display_name()
    }

    pub fn family(&self) -> Family {
        self.primary.family()
    }

    pub fn base_modes(&self) -> &[Arc<Mode>] {
        &self.base_modes
    }

    pub fn base_ids(&self) -> Vec<&str> {
        self.base_modes.iter().map(|m| m.id()).collect()
    }

    pub fn has_base(&self, id: &str) -> bool {
        self.base_modes.iter().any(|m| m.id() == id)
    }

    /// Whether more than one base mode is involved.
    pub fn is_combo(&self) -> bool {
        self.base_modes.len() > 1
    }

    pub fn base_display_names(&self) -> Vec<&str> {
        self.base_modes.iter().map(|m| m.display_name()).collect()
    }

    pub fn base_first_bid_aliases_or_ids(&self, with_emoji: bool) -> Vec<String> {
        self.base_modes
            .iter()
            .map(|m| m.first_bid_alias_or_id(with_emoji))
            .collect()
    }

    pub fn metagame(&self) -> Option<&MetagameDetails> {
        match &self.details {
            MatchDetails::Metagame(details) => Some(details),
            MatchDetails::Gimmick(_) => None,
        }
    }

    pub fn gimmick(&self) -> Option<&GimmickDetails> {
        match &self.details {
            MatchDetails::Gimmick(details) => Some(details),
            MatchDetails::Metagame(_) => None,
        }
    }

    pub fn clone_target(&self) -> Option<&str> {
        self.gimmick().and_then(|g| g.clone_target.as_deref())
    }

    pub fn switching_requested(&self) -> Option<bool> {
        self.gimmick().and_then(|g| g.switching_requested)
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_combo() {
            write!(
                f,
                "{} ({})",
                self.display_name(),
                stringify_list(&self.base_display_names())
            )
        } else {
            write!(f, "{}", self.display_name())
        }
    }
}

fn validate_base_modes(primary: &Mode, base_modes: &[Arc<Mode>]) -> ResolutionResult<()> {
    let invalid = || ResolutionError::InvalidMatchMode {
        primary: primary.id().to_string(),
        base_ids: base_modes.iter().map(|m| m.id().to_string()).collect(),
    };

    let distinct: BTreeSet<&str> = base_modes.iter().map(|m| m.id()).collect();
    let valid = match base_modes {
        [] => false,
        [only] => only.id() == primary.id(),
        _ => {
            primary.is_composite()
                && distinct.len() == base_modes.len()
                && base_modes
                    .iter()
                    .all(|m| !m.is_composite() && m.family() == primary.family())
        }
    };
    if valid {
        Ok(())
    } else {
        Err(invalid())
    }
}

fn generated_description(kind: CompositeKind, display_names: &[&str]) -> String {
    match kind {
        CompositeKind::VersusMix => {
            let first = display_names.first().copied().unwrap_or_default();
            let second = display_names.get(1).copied().unwrap_or_default();
            format!(
                "It's a showdown between Pokémon from the {} and {} metagames.",
                first, second
            )
        }
        CompositeKind::RandomMix => {
            format!("Metagames in this match are {}.", stringify_list(display_names))
        }
        CompositeKind::RandomCombo => {
            format!("Gimmicks in this match are {}.", stringify_list(display_names))
        }
    }
}

fn metagame_details(primary: &Mode, base_modes: &[Arc<Mode>]) -> MetagameDetails {
    let traits = primary.metagame_traits();
    match primary.composition() {
        None => MetagameDetails {
            set_tags: traits.map(|t| t.set_tags.clone()).unwrap_or_default(),
            is_versus: false,
            versus_tags: traits.and_then(|t| t.versus_tags.clone()),
            rarify_shinies: traits.and_then(|t| t.rarify_shinies).unwrap_or(true),
            allow_duplicate_pokesets: traits.is_some_and(|t| t.allow_duplicate_pokesets),
            allow_duplicate_team_species: traits.is_some_and(|t| t.allow_duplicate_team_species),
        },
        Some(composition) => {
            let base_traits: Vec<_> = base_modes.iter().filter_map(|m| m.metagame_traits()).collect();
            let rarify_shinies = traits.and_then(|t| t.rarify_shinies).unwrap_or_else(|| {
                base_traits.iter().all(|t| t.rarify_shinies.unwrap_or(true))
            });
            MetagameDetails {
                set_tags: base_traits.iter().flat_map(|t| t.set_tags.iter().cloned()).collect(),
                is_versus: composition.kind == CompositeKind::VersusMix,
                versus_tags: None,
                rarify_shinies,
                allow_duplicate_pokesets: false,
                allow_duplicate_team_species: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::mode::{DefKind, ModeEntry};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use schema::ModeDef;

    fn mode(id: &str, kind: DefKind, sub_modes: Option<Vec<&str>>) -> Arc<Mode> {
        let mut def = ModeDef {
            display_name: Some(id.to_uppercase()),
            description: Some(String::new()),
            sub_modes: sub_modes.map(|subs| subs.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        };
        if kind == DefKind::BaseMetagame {
            def.set_tag = Some(id.to_string());
        }
        let entry = ModeEntry {
            id: id.to_string(),
            kind,
            def,
        };
        Arc::new(Mode::from_entry(&entry).unwrap())
    }

    #[test]
    fn test_stringify_list() {
        assert_eq!(stringify_list::<&str>(&[]), "");
        assert_eq!(stringify_list(&["A"]), "A");
        assert_eq!(stringify_list(&["A", "B"]), "A and B");
        assert_eq!(stringify_list(&["A", "B", "C"]), "A, B and C");
    }

    #[test]
    fn test_base_primary_must_be_its_own_base() {
        let mut rng = StdRng::seed_from_u64(0);
        let speed = mode("speed", DefKind::BaseGimmick, None);
        let inverse = mode("inverse", DefKind::BaseGimmick, None);

        let ok = MatchMode::make(&speed, vec![speed.clone()], GimmickRequest::default(), &mut rng);
        assert!(ok.is_ok());

        let wrong = MatchMode::make(&speed, vec![inverse], GimmickRequest::default(), &mut rng);
        assert!(matches!(wrong, Err(ResolutionError::InvalidMatchMode { .. })));

        let empty = MatchMode::make(&speed, Vec::new(), GimmickRequest::default(), &mut rng);
        assert!(matches!(empty, Err(ResolutionError::InvalidMatchMode { .. })));
    }

    #[test]
    fn test_combo_rejects_repeated_bases() {
        let mut rng = StdRng::seed_from_u64(0);
        let speed = mode("speed", DefKind::BaseGimmick, None);
        let combo = mode("combo", DefKind::RandomCombo, Some(vec!["*", "*"]));
        let result = MatchMode::make(
            &combo,
            vec![speed.clone(), speed],
            GimmickRequest::default(),
            &mut rng,
        );
        assert!(matches!(result, Err(ResolutionError::InvalidMatchMode { .. })));
    }

    #[test]
    fn test_generated_descriptions_and_display() {
        let mut rng = StdRng::seed_from_u64(0);
        let advanced = mode("advanced", DefKind::BaseMetagame, None);
        let gen1 = mode("gen1", DefKind::BaseMetagame, None);
        let versus = mode("versus", DefKind::VersusMix, Some(vec!["advanced", "gen1"]));

        let result = MatchMode::make(
            &versus,
            vec![advanced, gen1],
            GimmickRequest::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(
            result.description,
            "It's a showdown between Pokémon from the ADVANCED and GEN1 metagames."
        );
        assert_eq!(result.to_string(), "VERSUS (ADVANCED and GEN1)");
        let details = result.metagame().unwrap();
        assert!(details.is_versus);
        assert_eq!(details.set_tags, vec!["advanced", "gen1"]);
        assert!(details.rarify_shinies);
    }
}
