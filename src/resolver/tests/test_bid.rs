#[cfg(test)]
mod tests {
    use crate::cooldowns::CooldownTracker;
    use crate::errors::{InvalidRequest, MatchmakerResult};
    use crate::modes::MatchMode;
    use crate::resolver::tests::common::{
        assert_invalid_request, assert_ok, base_ids, bid, mode_def, seeded_rng, TestConfigBuilder,
    };
    use crate::resolver::{BidRequest, ModeResolver};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use schema::{Family, ModeDef};

    fn bid_resolver() -> ModeResolver {
        TestConfigBuilder::new()
            .with_metagame("gen1", 1.0)
            .with_metagame("gen2", 1.0)
            .with_random_mix("mix", 1.0, &["gen1", "gen2"])
            .with_gimmick("speed", 1.0)
            .with_gimmick("inverse", 1.0)
            .with_gimmick("fog", 1.0)
            .with_gimmick("doubles", 1.0)
            .with_gimmick("defiance", 1.0)
            .with_gimmick_def(
                "secret",
                ModeDef {
                    biddable: false,
                    ..mode_def("secret", 1.0)
                },
            )
            .with_clone_gimmick("clone", 1.0, &["Ditto", "Mew"])
            .with_random_combo("double", 1.0, &["*", "*"])
            .with_bid_blacklist("speed", "fog")
            .configure(|settings| {
                settings.max_gimmicks = 3;
                settings.bid_rules.ally_hit_requires =
                    vec!["doubles".to_string(), "defiance".to_string()];
                settings
                    .restrictions
                    .token_matchmaking
                    .team_choice_blacklist
                    .insert("inverse".to_string());
            })
            .build()
    }

    fn resolve(
        resolver: &ModeResolver,
        request: &BidRequest,
    ) -> MatchmakerResult<(MatchMode, MatchMode)> {
        resolver.resolve_from_bid(request, &CooldownTracker::new(), &mut seeded_rng(1))
    }

    #[test]
    fn test_single_gimmick_bid_uses_default_metagame() {
        let resolver = bid_resolver();

        let (metagame, gimmick) = assert_ok(resolve(&resolver, &bid(&["speed"])));

        assert_eq!(metagame.primary_id(), "default");
        assert_eq!(gimmick.primary_id(), "speed");
        assert_eq!(gimmick.switching_requested(), Some(false));
    }

    #[test]
    fn test_tokens_match_case_insensitively() {
        let resolver = bid_resolver();

        let (metagame, gimmick) = assert_ok(resolve(&resolver, &bid(&["GEN1", "Speed"])));

        assert_eq!(metagame.primary_id(), "gen1");
        assert_eq!(gimmick.primary_id(), "speed");
    }

    #[test]
    fn test_blacklisted_pair_names_both_aliases() {
        let resolver = bid_resolver();

        let request = assert_invalid_request(resolve(&resolver, &bid(&["speed", "fog"])));
        let InvalidRequest::ModesConflict(first, second) = request else {
            panic!("expected a conflict, got {:?}", request);
        };
        let mut named = vec![first, second];
        named.sort();
        assert_eq!(named, vec!["fog".to_string(), "speed".to_string()]);

        assert_ok(resolve(&resolver, &bid(&["speed"])));
    }

    #[test]
    fn test_metagames_combine_only_through_composites() {
        let resolver = bid_resolver();

        let (metagame, _) = assert_ok(resolve(&resolver, &bid(&["gen2", "gen1"])));
        assert_eq!(metagame.primary_id(), "mix");
        assert_eq!(base_ids(&metagame), vec!["gen1", "gen2"]);

        let request = assert_invalid_request(resolve(&resolver, &bid(&["default", "gen1"])));
        assert!(matches!(request, InvalidRequest::ModesConflict(_, _)));
    }

    #[test]
    fn test_two_gimmicks_resolve_to_wildcard_combo() {
        let resolver = bid_resolver();

        let (_, gimmick) = assert_ok(resolve(&resolver, &bid(&["speed", "inverse"])));

        assert_eq!(gimmick.primary_id(), "double");
        assert_eq!(base_ids(&gimmick), vec!["inverse", "speed"]);
    }

    #[test]
    fn test_gimmicks_without_combo_cannot_combine() {
        let resolver = TestConfigBuilder::new()
            .with_gimmick("speed", 1.0)
            .with_gimmick("inverse", 1.0)
            .build();

        let request = assert_invalid_request(resolve(&resolver, &bid(&["speed", "inverse"])));

        assert_eq!(request, InvalidRequest::CannotCombine(Family::Gimmick));
    }

    #[rstest]
    #[case(&["speed", "blorp"], InvalidRequest::ModeNotExisting("blorp".to_string()))]
    #[case(&["secret"], InvalidRequest::IneligibleMode("secret".to_string()))]
    #[case(&["double"], InvalidRequest::WildcardComposite("double".to_string()))]
    #[case(
        &["double", "speed"],
        InvalidRequest::CompositeNotAlone { alias: "double".to_string(), family: Family::Gimmick }
    )]
    #[case(
        &["speed", "inverse", "doubles", "defiance"],
        InvalidRequest::TooManyModes { family: Family::Gimmick, max: 3 }
    )]
    #[case(&["mew"], InvalidRequest::SpeciesWithoutClone)]
    #[case(&["clone", "pikachu"], InvalidRequest::ModeNotExisting("pikachu".to_string()))]
    #[case(&["clone", "speed", "inverse", "mew"], InvalidRequest::TooManyCloneCompanions(1))]
    fn test_rejected_bids(#[case] tokens: &[&str], #[case] expected: InvalidRequest) {
        let resolver = bid_resolver();

        let request = assert_invalid_request(resolve(&resolver, &bid(tokens)));

        assert_eq!(request, expected);
    }

    #[test]
    fn test_cooling_mode_is_rejected() {
        let resolver = bid_resolver();
        let mut cooldowns = CooldownTracker::new();
        cooldowns.set("speed", 2);

        let result = resolver.resolve_from_bid(&bid(&["speed"]), &cooldowns, &mut seeded_rng(0));

        assert_eq!(
            assert_invalid_request(result),
            InvalidRequest::CoolingDown {
                alias: "speed".to_string(),
                remaining: 2
            }
        );
    }

    #[test]
    fn test_switch_token_requests_switching() {
        let resolver = bid_resolver();

        let (_, gimmick) = assert_ok(resolve(&resolver, &bid(&["speed", "switch"])));

        assert_eq!(gimmick.primary_id(), "speed");
        assert_eq!(gimmick.switching_requested(), Some(true));
    }

    #[test]
    fn test_clone_target_is_attached_to_the_gimmick() {
        let resolver = bid_resolver();

        let (_, gimmick) = assert_ok(resolve(&resolver, &bid(&["clone", "mew"])));

        assert_eq!(gimmick.primary_id(), "clone");
        assert_eq!(gimmick.clone_target(), Some("Mew"));
    }

    #[test]
    fn test_ally_hit_requires_configured_gimmicks() {
        let resolver = bid_resolver();
        let mut request = bid(&["doubles"]);
        request.ally_hit = Some(50);

        assert_eq!(
            assert_invalid_request(resolve(&resolver, &request)),
            InvalidRequest::AllyHitRequires("doubles and defiance".to_string())
        );

        request.tokens.push("defiance".to_string());
        let (_, gimmick) = assert_ok(resolve(&resolver, &request));
        assert_eq!(base_ids(&gimmick), vec!["defiance", "doubles"]);
    }

    #[test]
    fn test_team_choice_blacklist_applies_with_rosters() {
        let resolver = bid_resolver();
        let mut request = bid(&["inverse"]);

        assert_ok(resolve(&resolver, &request));

        request.teams_specified = true;
        assert_eq!(
            assert_invalid_request(resolve(&resolver, &request)),
            InvalidRequest::TeamChoiceRestriction("inverse".to_string())
        );
    }
}
