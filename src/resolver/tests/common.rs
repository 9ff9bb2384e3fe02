use crate::config::ConfigSet;
use crate::errors::{InvalidRequest, MatchmakerError, MatchmakerResult};
use crate::modes::MatchMode;
use crate::resolver::{BidRequest, ModeResolver};
use rand::rngs::StdRng;
use rand::SeedableRng;
use schema::{
    CategoryDef, CategoryKind, EventConfig, GimmickDefs, MatchmakerConfig, MetagameDefs, ModeDef,
    PairSpec,
};

/// A mode definition whose only alias is its id.
pub fn mode_def(id: &str, rarity: f64) -> ModeDef {
    ModeDef {
        display_name: Some(id.to_uppercase()),
        description: Some(format!("{} description", id)),
        rarity: Some(rarity),
        bid_aliases: vec![id.to_string()],
        ..Default::default()
    }
}

fn composite_def(id: &str, rarity: f64, components: &[&str]) -> ModeDef {
    ModeDef {
        sub_modes: Some(components.iter().map(|c| c.to_string()).collect()),
        description: Some(String::new()),
        ..mode_def(id, rarity)
    }
}

/// A builder for small event configurations.
///
/// Starts with a `default` metagame (rarity 1) and the `normal` gimmick, both
/// active in the event.
///
/// # Example
/// ```
/// let resolver = TestConfigBuilder::new()
///     .with_gimmick("speed", 2.0)
///     .with_bid_blacklist("default", "speed")
///     .build();
/// ```
pub struct TestConfigBuilder {
    settings: MatchmakerConfig,
    metagames: MetagameDefs,
    gimmicks: GimmickDefs,
    event: EventConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let builder = Self {
            settings: MatchmakerConfig::default(),
            metagames: MetagameDefs::default(),
            gimmicks: GimmickDefs::default(),
            event: EventConfig::default(),
        };
        let normal = ModeDef {
            rarity: None,
            ..mode_def("normal", 0.0)
        };
        builder
            .with_metagame("default", 1.0)
            .with_gimmick_def("normal", normal)
    }

    pub fn with_metagame(self, id: &str, rarity: f64) -> Self {
        let def = ModeDef {
            set_tag: Some(id.to_string()),
            ..mode_def(id, rarity)
        };
        self.with_metagame_def(id, def)
    }

    pub fn with_metagame_def(mut self, id: &str, def: ModeDef) -> Self {
        self.metagames.base.insert(id.to_string(), def);
        self.event.metagames.base.push(id.to_string());
        self
    }

    pub fn with_versus_mix(mut self, id: &str, rarity: f64, components: &[&str]) -> Self {
        self.metagames
            .versus_mixes
            .insert(id.to_string(), composite_def(id, rarity, components));
        self.event.metagames.versus_mixes.push(id.to_string());
        self
    }

    pub fn with_random_mix(mut self, id: &str, rarity: f64, components: &[&str]) -> Self {
        self.metagames
            .random_mixes
            .insert(id.to_string(), composite_def(id, rarity, components));
        self.event.metagames.random_mixes.push(id.to_string());
        self
    }

    pub fn with_gimmick(self, id: &str, rarity: f64) -> Self {
        self.with_gimmick_def(id, mode_def(id, rarity))
    }

    pub fn with_gimmick_def(mut self, id: &str, def: ModeDef) -> Self {
        self.gimmicks.base.insert(id.to_string(), def);
        if id != "normal" {
            self.event.gimmicks.base.push(id.to_string());
        }
        self
    }

    /// A base gimmick that replaces species from the given pool.
    pub fn with_clone_gimmick(self, id: &str, rarity: f64, pool: &[&str]) -> Self {
        let category = CategoryDef {
            pool: pool.iter().map(|p| p.to_string()).collect(),
            one_per_match: true,
            ..Default::default()
        };
        let mut def = mode_def(id, rarity);
        def.categories.insert(CategoryKind::SpeciesReplace, category);
        self.with_gimmick_def(id, def)
    }

    pub fn with_random_combo(mut self, id: &str, rarity: f64, components: &[&str]) -> Self {
        self.gimmicks
            .random_combos
            .insert(id.to_string(), composite_def(id, rarity, components));
        self.event.gimmicks.random_combos.push(id.to_string());
        self
    }

    /// Defines a gimmick without listing it in the event.
    pub fn with_unlisted_gimmick(mut self, id: &str, rarity: f64) -> Self {
        self.gimmicks.base.insert(id.to_string(), mode_def(id, rarity));
        self
    }

    pub fn with_automated_blacklist(mut self, a: &str, b: &str) -> Self {
        self.settings
            .restrictions
            .automated_matchmaking
            .mode_pair_blacklists
            .push(PairSpec::Pair(a.to_string(), b.to_string()));
        self
    }

    pub fn with_bid_blacklist(mut self, a: &str, b: &str) -> Self {
        self.settings
            .restrictions
            .token_matchmaking
            .mode_pair_blacklists
            .push(PairSpec::Pair(a.to_string(), b.to_string()));
        self
    }

    pub fn with_gimmick_chance(mut self, chance: f64) -> Self {
        self.settings.default_gimmick_chance = chance;
        self
    }

    /// Applies arbitrary changes to the top-level settings.
    pub fn configure<F: FnOnce(&mut MatchmakerConfig)>(mut self, change: F) -> Self {
        change(&mut self.settings);
        self
    }

    /// Applies arbitrary changes to the event document.
    pub fn configure_event<F: FnOnce(&mut EventConfig)>(mut self, change: F) -> Self {
        change(&mut self.event);
        self
    }

    pub fn build_config(self) -> ConfigSet {
        ConfigSet::from_parts(
            "test",
            self.settings,
            self.metagames,
            self.gimmicks,
            self.event,
        )
    }

    /// Builds the resolver. Panics if the configuration is rejected.
    pub fn build(self) -> ModeResolver {
        match ModeResolver::new(&self.build_config()) {
            Ok(resolver) => resolver,
            Err(err) => panic!("Test configuration was rejected: {}", err),
        }
    }
}

pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A bid made of the given tokens, without rosters.
pub fn bid(tokens: &[&str]) -> BidRequest {
    BidRequest {
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

/// Helper function to assert that a Result is Ok and return the value.
pub fn assert_ok<T>(result: MatchmakerResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("Expected Ok but got error: {}", err),
    }
}

/// Helper function to assert that a Result is an error and return it.
pub fn assert_err<T: std::fmt::Debug>(result: MatchmakerResult<T>) -> MatchmakerError {
    match result {
        Ok(value) => panic!("Expected an error but got {:?}", value),
        Err(err) => err,
    }
}

/// Helper function to assert that a bid was rejected and return the reason.
pub fn assert_invalid_request<T: std::fmt::Debug>(result: MatchmakerResult<T>) -> InvalidRequest {
    match assert_err(result) {
        MatchmakerError::InvalidRequest(request) => request,
        other => panic!("Expected an invalid request but got: {}", other),
    }
}

/// Base ids of a match mode as owned strings, for comparisons.
pub fn base_ids(mode: &MatchMode) -> Vec<String> {
    mode.base_ids().iter().map(|id| id.to_string()).collect()
}
