use crate::errors::{ConfigError, ConfigResult};
use crate::modes::expansion::{
    derive_normal_rarity, expand_gimmicks, rewrite_metagame_gimmick_ids, MustContain,
};
use crate::modes::mode::{DefKind, ModeEntry};
use schema::{EventConfig, GimmickDefs, MatchmakerConfig, MetagameDefs, ModeDef, NORMAL_GIMMICK};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Active definitions of both families, ready to build the registries from.
#[derive(Debug, Clone)]
pub struct PreparedModes {
    pub metagames: Vec<ModeEntry>,
    pub gimmicks: Vec<ModeEntry>,
    pub must_contain: MustContain,
}

/// Keeps the definitions listed for the event that are not disabled. The
/// normal gimmick is active in every event.
fn active_entries(
    kind: DefKind,
    defs: &BTreeMap<String, ModeDef>,
    listed: &[String],
    equalize: bool,
) -> Vec<ModeEntry> {
    for id in listed {
        if !defs.contains_key(id) {
            warn!("Event lists {} `{}`, which has no definition", kind.family(), id);
        }
    }

    defs.iter()
        .filter(|(id, def)| {
            !def.disabled
                && (listed.contains(*id) || (kind == DefKind::BaseGimmick && *id == NORMAL_GIMMICK))
        })
        .map(|(id, def)| {
            let mut def = def.clone();
            if equalize {
                equalize_rarities(&mut def);
            }
            ModeEntry {
                id: id.clone(),
                kind,
                def,
            }
        })
        .collect()
}

/// Debug switch: every non-zero rarity and sub rarity becomes 1.
fn equalize_rarities(def: &mut ModeDef) {
    if let Some(rarity) = def.rarity.as_mut() {
        if *rarity != 0.0 {
            *rarity = 1.0;
        }
    }
    def.sub_mode_rarities = std::mem::take(&mut def.sub_mode_rarities)
        .into_iter()
        .filter(|(_, rarity)| *rarity != 0.0)
        .map(|(id, _)| (id, 1.0))
        .collect();
}

/// Filters the definitions for the event, then applies the must-contain
/// expansion and the normal gimmick's derived rarity.
pub fn prepare_modes(
    config: &MatchmakerConfig,
    metagames: &MetagameDefs,
    gimmicks: &GimmickDefs,
    event: &EventConfig,
) -> ConfigResult<PreparedModes> {
    if gimmicks
        .base
        .get(NORMAL_GIMMICK)
        .is_some_and(|normal| normal.rarity.is_some())
    {
        return Err(ConfigError::NormalGimmickRarity);
    }

    let equalize = config.equalize_rarities;
    let base_gimmicks = active_entries(
        DefKind::BaseGimmick,
        &gimmicks.base,
        &event.gimmicks.base,
        equalize,
    );
    let combos = active_entries(
        DefKind::RandomCombo,
        &gimmicks.random_combos,
        &event.gimmicks.random_combos,
        equalize,
    );

    let must_contain = MustContain::new(
        &config.must_contain_all_gimmicks,
        &config.must_contain_any_gimmicks,
        |id| id != NORMAL_GIMMICK && base_gimmicks.iter().any(|entry| entry.id == id),
    );
    let default_sub_rarities: BTreeMap<String, f64> = base_gimmicks
        .iter()
        .filter(|entry| entry.id != NORMAL_GIMMICK)
        .map(|entry| (entry.id.clone(), entry.def.rarity.unwrap_or(0.0)))
        .collect();

    let entries = base_gimmicks.into_iter().chain(combos).collect();
    let expanded = expand_gimmicks(entries, &must_contain, &default_sub_rarities)?;
    let mut gimmick_entries = expanded.entries;
    derive_normal_rarity(
        &mut gimmick_entries,
        config.default_gimmick_chance,
        &expanded.rarity_adjusted,
        must_contain.is_active(),
    )?;

    let mut metagame_entries = Vec::new();
    for (kind, defs, listed) in [
        (DefKind::BaseMetagame, &metagames.base, &event.metagames.base),
        (DefKind::VersusMix, &metagames.versus_mixes, &event.metagames.versus_mixes),
        (DefKind::RandomMix, &metagames.random_mixes, &event.metagames.random_mixes),
    ] {
        metagame_entries.extend(active_entries(kind, defs, listed, equalize));
    }
    for entry in &mut metagame_entries {
        rewrite_metagame_gimmick_ids(&mut entry.def, &must_contain);
    }

    debug!(
        "Prepared {} metagames and {} gimmicks (must contain: {:?})",
        metagame_entries.len(),
        gimmick_entries.len(),
        must_contain.permutations()
    );

    Ok(PreparedModes {
        metagames: metagame_entries,
        gimmicks: gimmick_entries,
        must_contain,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn def(rarity: Option<f64>) -> ModeDef {
        ModeDef {
            display_name: Some("Mode".to_string()),
            description: Some(String::new()),
            rarity,
            ..Default::default()
        }
    }

    fn inputs() -> (MetagameDefs, GimmickDefs, EventConfig) {
        let mut metagame = def(Some(1.0));
        metagame.set_tag = Some("default".to_string());
        let metagames = MetagameDefs {
            base: BTreeMap::from([
                ("default".to_string(), metagame.clone()),
                ("unlisted".to_string(), metagame),
            ]),
            ..Default::default()
        };

        let mut disabled = def(Some(5.0));
        disabled.disabled = true;
        let gimmicks = GimmickDefs {
            base: BTreeMap::from([
                ("normal".to_string(), def(None)),
                ("speed".to_string(), def(Some(3.0))),
                ("inverse".to_string(), def(Some(0.5))),
                ("broken".to_string(), disabled),
            ]),
            ..Default::default()
        };

        let mut event = EventConfig::default();
        event.metagames.base = vec!["default".to_string()];
        event.gimmicks.base = vec!["speed".to_string(), "inverse".to_string(), "broken".to_string()];
        (metagames, gimmicks, event)
    }

    #[test]
    fn test_event_filtering_and_normal_rarity() {
        let (metagames, gimmicks, event) = inputs();
        let prepared = prepare_modes(&MatchmakerConfig::default(), &metagames, &gimmicks, &event).unwrap();

        let metagame_ids: Vec<&str> = prepared.metagames.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(metagame_ids, vec!["default"]);

        let gimmick_ids: Vec<&str> = prepared.gimmicks.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(gimmick_ids, vec!["inverse", "normal", "speed"]);

        let normal = prepared.gimmicks.iter().find(|e| e.id == "normal").unwrap();
        assert_eq!(normal.def.rarity, Some(3.5));
    }

    #[test]
    fn test_equalized_rarities() {
        let (metagames, gimmicks, event) = inputs();
        let config = MatchmakerConfig {
            equalize_rarities: true,
            ..Default::default()
        };
        let prepared = prepare_modes(&config, &metagames, &gimmicks, &event).unwrap();
        let normal = prepared.gimmicks.iter().find(|e| e.id == "normal").unwrap();
        assert_eq!(normal.def.rarity, Some(2.0));
    }

    #[test]
    fn test_configured_normal_rarity_is_rejected() {
        let (metagames, mut gimmicks, event) = inputs();
        gimmicks.base.insert("normal".to_string(), def(Some(1.0)));
        let result = prepare_modes(&MatchmakerConfig::default(), &metagames, &gimmicks, &event);
        assert!(matches!(result, Err(ConfigError::NormalGimmickRarity)));
    }
}
