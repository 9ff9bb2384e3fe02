use crate::settings::RawSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Marker used inside `sub_modes` for "any base mode of this family".
pub const WILDCARD: &str = "*";

/// The two orthogonal families of modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Family {
    Metagame,
    Gimmick,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Metagame => write!(f, "metagame"),
            Family::Gimmick => write!(f, "gimmick"),
        }
    }
}

/// Gimmick rule categories. Two base gimmicks declaring the same category
/// conflict, unless the category is mergeable.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CategoryKind {
    InputChange,
    TeamChange,
    BattleChange,
    SpeciesReplace,
    AbilityReplace,
    MoveReplace,
    ItemReplace,
    PokemonTheme,
}

impl CategoryKind {
    pub fn is_mergeable(self) -> bool {
        matches!(self, CategoryKind::TeamChange | CategoryKind::BattleChange)
    }

    pub fn is_tagged(self) -> bool {
        matches!(
            self,
            CategoryKind::InputChange | CategoryKind::TeamChange | CategoryKind::BattleChange
        )
    }
}

/// Payload of a gimmick category. Which fields matter depends on the kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryDef {
    pub tag: Option<String>,
    pub tags: Vec<String>,
    pub pool: Vec<String>,
    pub pool_whitelist: Vec<String>,
    pub pool_blacklist: Vec<String>,
    pub one_per_match: bool,
    pub any_tags: Vec<String>,
    pub all_tags: Vec<String>,
}

/// One mode definition, as written under its id in `metagames.ron` or
/// `gimmicks.ron`. Fields that only apply to one family are ignored for the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeDef {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub short_description: String,
    pub rarity: Option<f64>,
    pub match_settings: RawSettings,
    pub bid_aliases: Vec<String>,
    pub icon_id: Option<String>,
    pub emoji: Option<String>,
    pub cooldown: u32,
    pub biddable: bool,
    pub disabled: bool,

    // Composite modes
    pub sub_modes: Option<Vec<String>>,
    pub sub_mode_rarities: BTreeMap<String, f64>,
    pub sub_mode_rarities_whitelist: Vec<String>,
    pub sub_mode_rarities_blacklist: Vec<String>,

    // Metagames
    pub set_tag: Option<String>,
    pub versus_tags: Option<Vec<String>>,
    pub gimmick_rarities: BTreeMap<String, f64>,
    pub gimmick_rarity_whitelist: Vec<String>,
    pub gimmick_rarity_blacklist: Vec<String>,
    pub rarify_shinies: Option<bool>,
    pub allow_duplicate_pokesets: bool,
    pub allow_duplicate_team_species: bool,

    // Gimmicks
    pub categories: BTreeMap<CategoryKind, CategoryDef>,
}

impl Default for ModeDef {
    fn default() -> Self {
        Self {
            display_name: None,
            description: None,
            short_description: String::new(),
            rarity: None,
            match_settings: RawSettings::new(),
            bid_aliases: Vec::new(),
            icon_id: None,
            emoji: None,
            cooldown: 0,
            biddable: true,
            disabled: false,
            sub_modes: None,
            sub_mode_rarities: BTreeMap::new(),
            sub_mode_rarities_whitelist: Vec::new(),
            sub_mode_rarities_blacklist: Vec::new(),
            set_tag: None,
            versus_tags: None,
            gimmick_rarities: BTreeMap::new(),
            gimmick_rarity_whitelist: Vec::new(),
            gimmick_rarity_blacklist: Vec::new(),
            rarify_shinies: None,
            allow_duplicate_pokesets: false,
            allow_duplicate_team_species: false,
            categories: BTreeMap::new(),
        }
    }
}

/// Contents of `metagames.ron`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetagameDefs {
    pub base: BTreeMap<String, ModeDef>,
    pub versus_mixes: BTreeMap<String, ModeDef>,
    pub random_mixes: BTreeMap<String, ModeDef>,
}

/// Contents of `gimmicks.ron`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GimmickDefs {
    pub base: BTreeMap<String, ModeDef>,
    pub random_combos: BTreeMap<String, ModeDef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingLiteral;

    #[test]
    fn test_mode_def_parses_with_defaults() {
        let ron_text = r#"
            #![enable(implicit_some)]
            (
                display_name: "Duel",
                description: "One Pokémon each.",
                rarity: 2.0,
                bid_aliases: ["duel"],
                match_settings: {
                    1: { "team_sizes": { "1v1": { "rarity": 1, "biddable": true } } },
                    0: { "bet_bonus": 35, "switching": "special" },
                },
                categories: {
                    team_change: (tag: "duel"),
                    species_replace: (pool: ["Ditto"], one_per_match: true),
                },
            )
        "#;
        let def: ModeDef = ron::from_str(ron_text).expect("mode def should parse");

        assert_eq!(def.display_name.as_deref(), Some("Duel"));
        assert_eq!(def.rarity, Some(2.0));
        assert!(def.biddable);
        assert!(!def.disabled);
        assert_eq!(def.cooldown, 0);
        assert_eq!(
            def.match_settings[&0]["switching"],
            SettingLiteral::Text("special".to_string())
        );
        assert_eq!(
            def.match_settings[&0]["bet_bonus"],
            SettingLiteral::Number(35.0)
        );
        let team_sizes = &def.match_settings[&1]["team_sizes"];
        assert!(matches!(team_sizes, SettingLiteral::Table(t) if t.contains_key("1v1")));
        assert!(def.categories[&CategoryKind::SpeciesReplace].one_per_match);
        assert_eq!(
            def.categories[&CategoryKind::TeamChange].tag.as_deref(),
            Some("duel")
        );
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let ron_text = r#"
            #![enable(implicit_some)]
            (display_name: "X", description: "Y", categories: { made_up: () })
        "#;
        assert!(ron::from_str::<ModeDef>(ron_text).is_err());
    }

    #[test]
    fn test_category_kinds_mergeable() {
        assert!(CategoryKind::TeamChange.is_mergeable());
        assert!(CategoryKind::BattleChange.is_mergeable());
        assert!(!CategoryKind::InputChange.is_mergeable());
        assert!(!CategoryKind::SpeciesReplace.is_mergeable());
    }
}
