use crate::errors::{ConfigError, ConfigResult};
use crate::modes::mode::{Component, CompositeKind, Mode, ModeEntry};
use schema::Family;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Immutable registry of every active mode of one family.
///
/// Registry order is the order of the entries it was built from, base modes
/// first. Lookups accept ids, bid aliases (case-insensitive) and the emoji of
/// base modes.
#[derive(Debug, Clone)]
pub struct ModeCollection {
    family: Family,
    modes: Vec<Arc<Mode>>,
    by_id: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

impl ModeCollection {
    pub fn from_entries(family: Family, entries: &[ModeEntry]) -> ConfigResult<Self> {
        let mut modes: Vec<Arc<Mode>> = Vec::with_capacity(entries.len());
        for entry in entries {
            modes.push(Arc::new(Mode::from_entry(entry)?));
        }
        // Base modes come first so registry order sorts bases ahead of composites.
        modes.sort_by_key(|mode| mode.is_composite());

        let mut by_id = HashMap::new();
        for (index, mode) in modes.iter().enumerate() {
            if by_id.insert(mode.id().to_string(), index).is_some() {
                return Err(ConfigError::DuplicateId(mode.id().to_string()));
            }
        }

        let mut by_alias = HashMap::new();
        for (index, mode) in modes.iter().enumerate() {
            let info = mode.info();
            let emoji = if mode.is_composite() {
                None
            } else {
                info.emoji.as_ref()
            };
            for alias in info.bid_aliases.iter().chain(emoji) {
                if by_alias.insert(alias.to_lowercase(), index).is_some() {
                    return Err(ConfigError::DuplicateAlias {
                        id: mode.id().to_string(),
                        alias: alias.clone(),
                    });
                }
            }
        }

        let collection = Self {
            family,
            modes,
            by_id,
            by_alias,
        };
        collection.check_components()?;
        Ok(collection)
    }

    fn check_components(&self) -> ConfigResult<()> {
        for mode in self.composites() {
            let Some(composition) = mode.composition() else {
                continue;
            };
            for component in composition.fixed_ids() {
                if self.get_base(component).is_none() {
                    return Err(ConfigError::DanglingComponent {
                        composite: mode.id().to_string(),
                        component: component.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Looks up by exact id, then by alias.
    pub fn get(&self, name: &str) -> Option<&Arc<Mode>> {
        match self.by_id.get(name) {
            Some(index) => self.modes.get(*index),
            None => self.get_by_alias(name),
        }
    }

    /// Case-insensitive alias lookup. Emoji of base modes also resolve.
    pub fn get_by_alias(&self, alias: &str) -> Option<&Arc<Mode>> {
        self.by_alias
            .get(&alias.to_lowercase())
            .and_then(|index| self.modes.get(*index))
    }

    pub fn get_base(&self, id: &str) -> Option<&Arc<Mode>> {
        self.by_id
            .get(id)
            .and_then(|index| self.modes.get(*index))
            .filter(|mode| !mode.is_composite())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn is_base(&self, id: &str) -> bool {
        self.get_base(id).is_some()
    }

    /// Every mode, in registry order.
    pub fn all(&self) -> &[Arc<Mode>] {
        &self.modes
    }

    pub fn base_modes(&self) -> impl Iterator<Item = &Arc<Mode>> {
        self.modes.iter().filter(|mode| !mode.is_composite())
    }

    pub fn composites(&self) -> impl Iterator<Item = &Arc<Mode>> {
        self.modes.iter().filter(|mode| mode.is_composite())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.modes.iter().map(|mode| mode.id())
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    /// Registry position of an id, used to sort selections.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Sorts ids into registry order. Unknown ids sort last.
    pub fn sort_ids<S: AsRef<str>>(&self, ids: &mut [S]) {
        ids.sort_by_key(|id| self.position(id.as_ref()).unwrap_or(usize::MAX));
    }

    /// Maps every id with at least one alias to its first alias.
    pub fn id_to_first_alias(&self) -> BTreeMap<String, String> {
        self.modes
            .iter()
            .filter_map(|mode| {
                mode.first_bid_alias()
                    .map(|alias| (mode.id().to_string(), alias.to_string()))
            })
            .collect()
    }

    /// Finds the first biddable composite, in registry order, made of exactly
    /// the given base ids. Composites with wildcard slots match any request of
    /// the same length. Versus composites are never matched.
    pub fn biddable_combo_for(&self, ids: &[&str]) -> Option<&Arc<Mode>> {
        let requested: BTreeSet<&str> = ids.iter().copied().collect();
        self.composites().find(|mode| {
            let Some(composition) = mode.composition() else {
                return false;
            };
            if !mode.is_biddable() || composition.kind == CompositeKind::VersusMix {
                return false;
            }
            if composition.has_wildcard() {
                return composition.components.len() == requested.len();
            }
            let components: BTreeSet<&str> = composition
                .components
                .iter()
                .filter_map(Component::id)
                .collect();
            components == requested
        })
    }
}

/// Rejects ids, aliases and emoji shared between the two registries.
pub fn validate_registries(metagames: &ModeCollection, gimmicks: &ModeCollection) -> ConfigResult<()> {
    let mut ids = BTreeSet::new();
    let mut aliases = BTreeSet::new();
    let mut emoji_owners: BTreeMap<&str, &str> = BTreeMap::new();

    for collection in [metagames, gimmicks] {
        for mode in collection.all() {
            if !ids.insert(mode.id()) {
                return Err(ConfigError::DuplicateId(mode.id().to_string()));
            }
            for alias in &mode.info().bid_aliases {
                if !aliases.insert(alias.to_lowercase()) {
                    return Err(ConfigError::DuplicateAlias {
                        id: mode.id().to_string(),
                        alias: alias.clone(),
                    });
                }
            }
        }
        for mode in collection.base_modes() {
            if let Some(emoji) = &mode.info().emoji {
                if let Some(first) = emoji_owners.insert(emoji.as_str(), mode.id()) {
                    return Err(ConfigError::DuplicateEmoji {
                        emoji: emoji.clone(),
                        first: first.to_string(),
                        second: mode.id().to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}
