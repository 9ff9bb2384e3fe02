//! Loading of the declarative matchmaker configuration.
//!
//! A deployment directory holds `settings.ron`, `metagames.ron`,
//! `gimmicks.ron` and one `events/<id>.ron` per event. Loading reads all four,
//! then folds the event's overrides into the other three so that every
//! registry is built from a single, already-resolved [`ConfigSet`].

use crate::errors::{ConfigError, ConfigResult};
use schema::{
    EventConfig, GimmickDefs, MatchmakerConfig, MetagameDefs, ModeDef, ModeOverride, RawSettings,
};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Every configuration document of one event, with the event overrides applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSet {
    pub event_id: String,
    pub settings: MatchmakerConfig,
    pub metagames: MetagameDefs,
    pub gimmicks: GimmickDefs,
    pub event: EventConfig,
}

impl ConfigSet {
    /// Reads the configuration of `event_id` from `dir`.
    pub fn load(dir: impl AsRef<Path>, event_id: &str) -> ConfigResult<Self> {
        let dir = dir.as_ref();
        let settings = read_ron(&dir.join("settings.ron"))?;
        let metagames = read_ron(&dir.join("metagames.ron"))?;
        let gimmicks = read_ron(&dir.join("gimmicks.ron"))?;
        let event = read_ron(&dir.join("events").join(format!("{}.ron", event_id)))?;

        info!("Loaded matchmaker configuration from {} for event `{}`", dir.display(), event_id);
        Ok(Self::from_parts(event_id, settings, metagames, gimmicks, event))
    }

    /// Parses the four documents from memory. Used by tests and embedders that
    /// keep their configuration elsewhere.
    pub fn from_ron_strs(
        event_id: &str,
        settings: &str,
        metagames: &str,
        gimmicks: &str,
        event: &str,
    ) -> ConfigResult<Self> {
        Ok(Self::from_parts(
            event_id,
            parse_ron(settings, Path::new("settings.ron"))?,
            parse_ron(metagames, Path::new("metagames.ron"))?,
            parse_ron(gimmicks, Path::new("gimmicks.ron"))?,
            parse_ron(event, &PathBuf::from(format!("events/{}.ron", event_id)))?,
        ))
    }

    /// Assembles a set from already parsed documents and applies the event
    /// overrides.
    pub fn from_parts(
        event_id: &str,
        settings: MatchmakerConfig,
        metagames: MetagameDefs,
        gimmicks: GimmickDefs,
        event: EventConfig,
    ) -> Self {
        let mut set = Self {
            event_id: event_id.to_string(),
            settings,
            metagames,
            gimmicks,
            event,
        };
        set.apply_event_overrides();
        set
    }

    /// Folds the event's overrides into the settings and mode definitions.
    fn apply_event_overrides(&mut self) {
        let overrides = self.event.overrides.clone();
        let settings = &mut self.settings;

        if let Some(value) = overrides.default_metagame {
            settings.default_metagame = value;
        }
        if let Some(value) = overrides.default_gimmick {
            settings.default_gimmick = value;
        }
        if let Some(value) = overrides.default_gimmick_chance {
            settings.default_gimmick_chance = value;
        }
        if let Some(value) = overrides.max_metagames {
            settings.max_metagames = value;
        }
        if let Some(value) = overrides.max_gimmicks {
            settings.max_gimmicks = value;
        }
        if let Some(value) = overrides.must_contain_all_gimmicks {
            settings.must_contain_all_gimmicks = value;
        }
        if let Some(value) = overrides.must_contain_any_gimmicks {
            settings.must_contain_any_gimmicks = value;
        }
        if let Some(value) = overrides.equalize_rarities {
            settings.equalize_rarities = value;
        }
        if let Some(value) = overrides.team_size_soft_limit {
            settings.team_size_soft_limit = value;
        }
        if let Some(value) = overrides.uneven_teams_cooldown {
            settings.uneven_teams_cooldown = value;
        }
        if let Some(value) = overrides.large_teams_cooldown {
            settings.large_teams_cooldown = value;
        }
        if let Some(value) = overrides.rotations {
            settings.rotations = value;
        }
        merge_raw_settings(&mut settings.mergeable.default, &overrides.default_settings);

        let event_id = self.event_id.clone();
        for (id, mode_override) in &overrides.modes {
            match self.find_def_mut(id) {
                Some(def) => apply_mode_override(def, mode_override),
                None => warn!("Event `{}` overrides unknown mode `{}`", event_id, id),
            }
        }
    }

    fn find_def_mut(&mut self, id: &str) -> Option<&mut ModeDef> {
        let metagames = &mut self.metagames;
        let gimmicks = &mut self.gimmicks;
        [
            &mut metagames.base,
            &mut metagames.versus_mixes,
            &mut metagames.random_mixes,
            &mut gimmicks.base,
            &mut gimmicks.random_combos,
        ]
        .into_iter()
        .find_map(|defs| defs.get_mut(id))
    }
}

fn apply_mode_override(def: &mut ModeDef, mode_override: &ModeOverride) {
    if let Some(rarity) = mode_override.rarity {
        def.rarity = Some(rarity);
    }
    if let Some(cooldown) = mode_override.cooldown {
        def.cooldown = cooldown;
    }
    if let Some(biddable) = mode_override.biddable {
        def.biddable = biddable;
    }
    if let Some(disabled) = mode_override.disabled {
        def.disabled = disabled;
    }
    merge_raw_settings(&mut def.match_settings, &mode_override.match_settings);
    for (gimmick_id, rarity) in &mode_override.gimmick_rarities {
        def.gimmick_rarities.insert(gimmick_id.clone(), *rarity);
    }
}

/// Replaces settings name by name within each tier of `extra`.
fn merge_raw_settings(target: &mut RawSettings, extra: &RawSettings) {
    for (priority, entries) in extra {
        let tier = target.entry(*priority).or_default();
        for (name, literal) in entries {
            tier.insert(name.clone(), literal.clone());
        }
    }
}

fn read_ron<T: DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_ron(&content, path)
}

fn parse_ron<T: DeserializeOwned>(content: &str, path: &Path) -> ConfigResult<T> {
    ron::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
