use lineup_core::{CacheKey, KeySegment, MatchId, PlayerId, QueryKeys};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = KeySegment> {
    prop_oneof![
        any::<i64>().prop_map(KeySegment::Num),
        "[a-z]{1,8}".prop_map(KeySegment::Str),
    ]
}

fn key() -> impl Strategy<Value = CacheKey> {
    prop::collection::vec(segment(), 0..6).prop_map(|segments| CacheKey::new(segments))
}

proptest! {
    #[test]
    fn identical_parameters_give_equal_keys(player in any::<i64>(), game in any::<i64>()) {
        let a = QueryKeys::coach_player_match(PlayerId::new(player), MatchId::new(game));
        let b = QueryKeys::coach_player_match(PlayerId::new(player), MatchId::new(game));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn child_always_starts_with_parent(base in key(), extra in segment()) {
        let child = base.child(extra);
        prop_assert!(child.starts_with(&base));
        prop_assert!(base.is_ancestor_of(&child));
    }

    #[test]
    fn string_prefix_is_not_segment_prefix(word in "[a-z]{2,8}", cut in 1usize..2) {
        let partial = &word[..word.len() - cut];
        let full = CacheKey::new(["coach", word.as_str()]);
        let truncated = CacheKey::new(["coach", partial]);
        prop_assert!(!full.starts_with(&truncated));
    }

    #[test]
    fn distinct_players_never_share_detail_keys(a in any::<i64>(), b in any::<i64>()) {
        prop_assume!(a != b);
        let ka = QueryKeys::coach_player(PlayerId::new(a));
        let kb = QueryKeys::coach_player(PlayerId::new(b));
        prop_assert!(!ka.starts_with(&kb));
        prop_assert!(!kb.starts_with(&ka));
    }

    #[test]
    fn key_json_round_trips(k in key()) {
        let json = serde_json::to_string(&k).unwrap();
        let back: CacheKey = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, k);
    }
}
