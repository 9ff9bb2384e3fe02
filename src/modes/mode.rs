use crate::errors::{ConfigError, ConfigResult};
use crate::modes::categories::{categories_from_defs, Categories};
use crate::settings::MatchSettings;
use schema::{Family, ModeDef, WILDCARD};
use std::collections::BTreeMap;

/// Where a definition was declared, which fixes its family and composite kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    BaseMetagame,
    VersusMix,
    RandomMix,
    BaseGimmick,
    RandomCombo,
}

impl DefKind {
    pub fn family(self) -> Family {
        match self {
            DefKind::BaseMetagame | DefKind::VersusMix | DefKind::RandomMix => Family::Metagame,
            DefKind::BaseGimmick | DefKind::RandomCombo => Family::Gimmick,
        }
    }

    pub fn composite_kind(self) -> Option<CompositeKind> {
        match self {
            DefKind::BaseMetagame | DefKind::BaseGimmick => None,
            DefKind::VersusMix => Some(CompositeKind::VersusMix),
            DefKind::RandomMix => Some(CompositeKind::RandomMix),
            DefKind::RandomCombo => Some(CompositeKind::RandomCombo),
        }
    }
}

/// An active mode definition after event filtering and must-contain expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeEntry {
    pub id: String,
    pub kind: DefKind,
    pub def: ModeDef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    /// Two components are drawn, one for each team.
    VersusMix,
    /// Every usable component applies to the whole match.
    RandomMix,
    /// A gimmick combination, possibly with wildcard slots.
    RandomCombo,
}

/// One slot of a composite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Id(String),
    /// Any base mode of the family, drawn when the match is resolved.
    Wildcard,
}

impl Component {
    pub fn id(&self) -> Option<&str> {
        match self {
            Component::Id(id) => Some(id),
            Component::Wildcard => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub kind: CompositeKind,
    pub components: Vec<Component>,
    pub sub_mode_rarities: BTreeMap<String, f64>,
    pub sub_mode_whitelist: Vec<String>,
    pub sub_mode_blacklist: Vec<String>,
}

impl Composition {
    pub fn fixed_ids(&self) -> impl Iterator<Item = &str> {
        self.components.iter().filter_map(Component::id)
    }

    pub fn has_wildcard(&self) -> bool {
        self.components.contains(&Component::Wildcard)
    }

    /// Whether optional sub rarities were configured for wildcard draws.
    pub fn has_sub_rarity_overrides(&self) -> bool {
        !self.sub_mode_rarities.is_empty()
            || !self.sub_mode_whitelist.is_empty()
            || !self.sub_mode_blacklist.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetagameTraits {
    pub set_tags: Vec<String>,
    pub versus_tags: Option<Vec<String>>,
    pub gimmick_rarities: BTreeMap<String, f64>,
    pub gimmick_rarity_whitelist: Vec<String>,
    pub gimmick_rarity_blacklist: Vec<String>,
    pub rarify_shinies: Option<bool>,
    pub allow_duplicate_pokesets: bool,
    pub allow_duplicate_team_species: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GimmickTraits {
    pub categories: Categories,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FamilyTraits {
    Metagame(MetagameTraits),
    Gimmick(GimmickTraits),
}

/// Attributes shared by base and composite modes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeInfo {
    pub id: String,
    pub family: Family,
    pub display_name: String,
    pub description: String,
    pub short_description: String,
    pub rarity: f64,
    pub match_settings: MatchSettings,
    pub bid_aliases: Vec<String>,
    pub icon_id: String,
    pub emoji: Option<String>,
    pub cooldown: u32,
    pub biddable: bool,
    pub traits: FamilyTraits,
}

/// A metagame or gimmick definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Base(ModeInfo),
    Composite(ModeInfo, Composition),
}

impl Mode {
    /// Validates and builds a mode from an active definition.
    pub fn from_entry(entry: &ModeEntry) -> ConfigResult<Self> {
        let ModeEntry { id, kind, def } = entry;
        let family = kind.family();
        let missing = |field: &'static str| ConfigError::MissingField {
            id: id.clone(),
            field,
        };

        let display_name = def.display_name.clone().ok_or_else(|| missing("display_name"))?;
        let description = def.description.clone().ok_or_else(|| missing("description"))?;
        let rarity = def.rarity.unwrap_or(0.0);
        if rarity < 0.0 {
            return Err(ConfigError::NegativeRarity {
                id: id.clone(),
                rarity,
            });
        }
        let match_settings =
            MatchSettings::from_config(&def.match_settings).map_err(|source| {
                ConfigError::Settings {
                    owner: id.clone(),
                    source,
                }
            })?;

        let traits = match family {
            Family::Metagame => {
                let set_tags = match (&def.set_tag, kind.composite_kind()) {
                    (Some(tag), None) => vec![tag.clone()],
                    (None, None) => return Err(missing("set_tag")),
                    (_, Some(_)) => Vec::new(),
                };
                FamilyTraits::Metagame(MetagameTraits {
                    set_tags,
                    versus_tags: def.versus_tags.clone(),
                    gimmick_rarities: def.gimmick_rarities.clone(),
                    gimmick_rarity_whitelist: def.gimmick_rarity_whitelist.clone(),
                    gimmick_rarity_blacklist: def.gimmick_rarity_blacklist.clone(),
                    rarify_shinies: def.rarify_shinies,
                    allow_duplicate_pokesets: def.allow_duplicate_pokesets,
                    allow_duplicate_team_species: def.allow_duplicate_team_species,
                })
            }
            Family::Gimmick => FamilyTraits::Gimmick(GimmickTraits {
                categories: categories_from_defs(id, &def.categories)?,
            }),
        };

        let info = ModeInfo {
            id: id.clone(),
            family,
            display_name,
            description,
            short_description: def.short_description.clone(),
            rarity,
            match_settings,
            bid_aliases: def.bid_aliases.clone(),
            icon_id: def.icon_id.clone().unwrap_or_else(|| id.clone()),
            emoji: def.emoji.clone(),
            cooldown: def.cooldown,
            biddable: def.biddable,
            traits,
        };

        match (kind.composite_kind(), &def.sub_modes) {
            (None, None) => Ok(Mode::Base(info)),
            (None, Some(_)) => Err(ConfigError::BaseWithSubModes(id.clone())),
            (Some(_), None) => Err(ConfigError::CompositeWithoutSubModes(id.clone())),
            (Some(_), Some(sub_modes)) if sub_modes.is_empty() => {
                Err(ConfigError::CompositeWithoutSubModes(id.clone()))
            }
            (Some(composite_kind), Some(sub_modes)) => {
                let mut components = Vec::with_capacity(sub_modes.len());
                for sub_mode in sub_modes {
                    if sub_mode == WILDCARD {
                        if family != Family::Gimmick {
                            return Err(ConfigError::UnsupportedWildcard(id.clone()));
                        }
                        components.push(Component::Wildcard);
                    } else {
                        components.push(Component::Id(sub_mode.clone()));
                    }
                }
                let composition = Composition {
                    kind: composite_kind,
                    components,
                    sub_mode_rarities: def.sub_mode_rarities.clone(),
                    sub_mode_whitelist: def.sub_mode_rarities_whitelist.clone(),
                    sub_mode_blacklist: def.sub_mode_rarities_blacklist.clone(),
                };
                Ok(Mode::Composite(info, composition))
            }
        }
    }

    pub fn info(&self) -> &ModeInfo {
        match self {
            Mode::Base(info) | Mode::Composite(info, _) => info,
        }
    }

    pub fn id(&self) -> &str {
        &self.info().id
    }

    pub fn family(&self) -> Family {
        self.info().family
    }

    pub fn display_name(&self) -> &str {
        &self.info().display_name
    }

    pub fn rarity(&self) -> f64 {
        self.info().rarity
    }

    pub fn is_biddable(&self) -> bool {
        self.info().biddable
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Mode::Composite(..))
    }

    pub fn composition(&self) -> Option<&Composition> {
        match self {
            Mode::Base(_) => None,
            Mode::Composite(_, composition) => Some(composition),
        }
    }

    pub fn metagame_traits(&self) -> Option<&MetagameTraits> {
        match &self.info().traits {
            FamilyTraits::Metagame(traits) => Some(traits),
            FamilyTraits::Gimmick(_) => None,
        }
    }

    /// Categories of a gimmick. Metagames have none.
    pub fn categories(&self) -> Option<&Categories> {
        match &self.info().traits {
            FamilyTraits::Gimmick(traits) => Some(&traits.categories),
            FamilyTraits::Metagame(_) => None,
        }
    }

    pub fn first_bid_alias(&self) -> Option<&str> {
        self.info().bid_aliases.first().map(String::as_str)
    }

    /// The first bid alias, or the id when the mode has none, optionally
    /// followed by the emoji.
    pub fn first_bid_alias_or_id(&self, with_emoji: bool) -> String {
        let info = self.info();
        let mut name = self.first_bid_alias().unwrap_or(info.id.as_str()).to_string();
        if with_emoji {
            if let Some(emoji) = &info.emoji {
                name.push(' ');
                name.push_str(emoji);
            }
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn def(display_name: &str) -> ModeDef {
        ModeDef {
            display_name: Some(display_name.to_string()),
            description: Some(format!("{} description", display_name)),
            ..Default::default()
        }
    }

    fn entry(id: &str, kind: DefKind, def: ModeDef) -> ModeEntry {
        ModeEntry {
            id: id.to_string(),
            kind,
            def,
        }
    }

    #[test]
    fn test_base_metagame_requires_set_tag() {
        let result = Mode::from_entry(&entry("advanced", DefKind::BaseMetagame, def("Advanced")));
        assert!(matches!(
            result,
            Err(ConfigError::MissingField {
                field: "set_tag",
                ..
            })
        ));
    }

    #[test]
    fn test_required_fields() {
        let mut no_description = def("Speed");
        no_description.description = None;
        let result = Mode::from_entry(&entry("speed", DefKind::BaseGimmick, no_description));
        assert!(matches!(
            result,
            Err(ConfigError::MissingField {
                field: "description",
                ..
            })
        ));
    }

    #[test]
    fn test_base_and_composite_shapes() {
        let mut with_subs = def("Speed");
        with_subs.sub_modes = Some(vec!["inverse".to_string()]);
        assert!(matches!(
            Mode::from_entry(&entry("speed", DefKind::BaseGimmick, with_subs)),
            Err(ConfigError::BaseWithSubModes(_))
        ));

        assert!(matches!(
            Mode::from_entry(&entry("combo", DefKind::RandomCombo, def("Combo"))),
            Err(ConfigError::CompositeWithoutSubModes(_))
        ));
    }

    #[test]
    fn test_wildcards_only_for_gimmicks() {
        let mut mix = def("Mix");
        mix.sub_modes = Some(vec!["*".to_string(), "advanced".to_string()]);
        assert!(matches!(
            Mode::from_entry(&entry("mix", DefKind::RandomMix, mix.clone())),
            Err(ConfigError::UnsupportedWildcard(_))
        ));

        let combo = Mode::from_entry(&entry("combo", DefKind::RandomCombo, mix)).unwrap();
        let composition = combo.composition().unwrap();
        assert!(composition.has_wildcard());
        assert_eq!(composition.fixed_ids().collect::<Vec<_>>(), vec!["advanced"]);
    }

    #[test]
    fn test_alias_fallbacks() {
        let mut speed = def("Speed");
        speed.emoji = Some("⚡".to_string());
        let mode = Mode::from_entry(&entry("speed", DefKind::BaseGimmick, speed.clone())).unwrap();
        assert_eq!(mode.first_bid_alias(), None);
        assert_eq!(mode.first_bid_alias_or_id(true), "speed ⚡");
        assert_eq!(mode.info().icon_id, "speed");

        speed.bid_aliases = vec!["fast".to_string(), "speedy".to_string()];
        let mode = Mode::from_entry(&entry("speed", DefKind::BaseGimmick, speed)).unwrap();
        assert_eq!(mode.first_bid_alias_or_id(false), "fast");
    }
}
