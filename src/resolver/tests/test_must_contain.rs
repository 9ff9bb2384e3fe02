#[cfg(test)]
mod tests {
    use crate::cooldowns::CooldownTracker;
    use crate::errors::InvalidRequest;
    use crate::resolver::tests::common::{
        assert_invalid_request, assert_ok, base_ids, bid, seeded_rng, TestConfigBuilder,
    };
    use crate::resolver::ModeResolver;
    use pretty_assertions::assert_eq;

    fn forced_resolver() -> ModeResolver {
        TestConfigBuilder::new()
            .with_gimmick("speed", 1.0)
            .with_gimmick("inverse", 1.0)
            .with_gimmick("forced", 1.0)
            .configure(|settings| {
                settings.must_contain_all_gimmicks = vec!["forced".to_string()];
            })
            .build()
    }

    #[test]
    fn test_automated_gimmicks_always_contain_required_gimmick() {
        let resolver = forced_resolver();

        for seed in 0..100 {
            let (_, gimmick) = resolver
                .resolve_automated(&[], &mut seeded_rng(seed))
                .expect("automated resolution should succeed");
            assert!(
                gimmick.has_base("forced"),
                "seed {} produced {:?}",
                seed,
                base_ids(&gimmick)
            );
        }
    }

    #[test]
    fn test_expansion_generates_a_combo_per_gimmick() {
        let resolver = forced_resolver();

        let speed_combo = resolver.gimmicks().get("speed+forced_autogenerated");
        let inverse_combo = resolver.gimmicks().get("inverse+forced_autogenerated");

        assert!(speed_combo.is_some_and(|mode| mode.is_composite()));
        assert!(inverse_combo.is_some_and(|mode| mode.is_composite()));
        assert!(resolver.gimmicks().get("forced+forced_autogenerated").is_none());
        assert_eq!(resolver.must_contain().all, vec!["forced".to_string()]);
    }

    #[test]
    fn test_bids_must_name_required_gimmick() {
        // Arrange
        let resolver = forced_resolver();
        let tracker = CooldownTracker::new();

        // Act
        let missing = resolver.resolve_from_bid(&bid(&["speed"]), &tracker, &mut seeded_rng(0));
        let named = resolver.resolve_from_bid(&bid(&["speed", "forced"]), &tracker, &mut seeded_rng(0));

        // Assert
        assert_eq!(
            assert_invalid_request(missing),
            InvalidRequest::MustContainAll("forced".to_string())
        );
        let (_, gimmick) = assert_ok(named);
        assert_eq!(gimmick.primary_id(), "speed+forced_autogenerated");
        assert_eq!(base_ids(&gimmick), vec!["forced", "speed"]);
    }

    #[test]
    fn test_must_contain_any_accepts_either_gimmick() {
        let resolver = TestConfigBuilder::new()
            .with_gimmick("speed", 1.0)
            .with_gimmick("fog", 1.0)
            .with_gimmick("rain", 1.0)
            .configure(|settings| {
                settings.must_contain_any_gimmicks = vec!["fog".to_string(), "rain".to_string()];
            })
            .build();
        let tracker = CooldownTracker::new();

        let missing = resolver.resolve_from_bid(&bid(&["speed"]), &tracker, &mut seeded_rng(0));
        assert_eq!(
            assert_invalid_request(missing),
            InvalidRequest::MustContainAny("fog, rain".to_string())
        );

        for token in ["fog", "rain"] {
            let (_, gimmick) =
                assert_ok(resolver.resolve_from_bid(&bid(&[token]), &tracker, &mut seeded_rng(0)));
            assert_eq!(gimmick.primary_id(), token);
        }

        for seed in 0..100 {
            let (_, gimmick) = resolver
                .resolve_automated(&[], &mut seeded_rng(seed))
                .expect("automated resolution should succeed");
            assert!(gimmick.has_base("fog") || gimmick.has_base("rain"));
        }
    }

    #[test]
    fn test_inactive_required_gimmicks_are_ignored() {
        let resolver = TestConfigBuilder::new()
            .with_gimmick("speed", 1.0)
            .with_unlisted_gimmick("forced", 1.0)
            .configure(|settings| {
                settings.must_contain_all_gimmicks = vec!["forced".to_string()];
            })
            .build();

        let result =
            resolver.resolve_from_bid(&bid(&["speed"]), &CooldownTracker::new(), &mut seeded_rng(0));

        assert_ok(result);
        assert!(resolver.must_contain().all.is_empty());
    }
}
