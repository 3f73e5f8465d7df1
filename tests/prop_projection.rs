use bson::{Bson, Document, doc};
use montylite::engine::{Match, Projector, QueryFilter};
use proptest::prelude::*;

fn document() -> impl Strategy<Value = Document> {
    proptest::collection::btree_map("[a-e]", any::<i32>(), 0..5).prop_map(|m| {
        let mut d = doc! {"_id": 1};
        for (k, v) in m {
            d.insert(k, Bson::Int32(v));
        }
        d
    })
}

/// Keys in arbitrary order, `_id` somewhere among them.
fn shuffled_document() -> impl Strategy<Value = Document> {
    let keys = vec!["_id", "a", "b", "c", "d", "e"];
    (Just(keys).prop_shuffle(), 1..=6usize, any::<i32>()).prop_map(|(keys, n, seed)| {
        let mut d = Document::new();
        for (i, k) in keys.into_iter().take(n).enumerate() {
            d.insert(k, Bson::Int32(seed.wrapping_add(i32::try_from(i).unwrap_or(0))));
        }
        d
    })
}

fn is_subsequence(sub: &[&String], full: &[&String]) -> bool {
    let mut rest = full.iter();
    sub.iter().all(|k| rest.any(|f| f == k))
}

fn spec() -> impl Strategy<Value = (Document, bool)> {
    (proptest::collection::btree_set("[a-e]", 1..4), any::<bool>()).prop_map(|(keys, include)| {
        let mut d = Document::new();
        for k in keys {
            d.insert(k, i32::from(include));
        }
        (d, include)
    })
}

proptest! {
    #[test]
    fn prop_projection_is_idempotent(d in document(), (s, _) in spec()) {
        let filter = QueryFilter::compile(&doc! {}).unwrap();
        let p = Projector::compile(&s, &filter).unwrap();
        let once = p.apply(&Match::bare(d)).unwrap();
        let twice = p.apply(&Match::bare(once.clone())).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_projection_keeps_only_requested_keys(d in document(), (s, include) in spec()) {
        let filter = QueryFilter::compile(&doc! {}).unwrap();
        let out = Projector::compile(&s, &filter).unwrap().apply(&Match::bare(d.clone())).unwrap();
        prop_assert_eq!(out.get("_id"), Some(&Bson::Int32(1)));
        for (k, v) in &d {
            if k == "_id" {
                continue;
            }
            let kept = out.get(k);
            if s.contains_key(k) == include {
                prop_assert_eq!(kept, Some(v));
            } else {
                prop_assert_eq!(kept, None);
            }
        }
    }

    #[test]
    fn prop_projection_keeps_document_key_order(d in shuffled_document(), (s, _) in spec()) {
        let filter = QueryFilter::compile(&doc! {}).unwrap();
        let out = Projector::compile(&s, &filter).unwrap().apply(&Match::bare(d.clone())).unwrap();
        let out_keys: Vec<&String> = out.keys().collect();
        let in_keys: Vec<&String> = d.keys().collect();
        prop_assert!(is_subsequence(&out_keys, &in_keys), "{:?} not in order of {:?}", out_keys, in_keys);
    }
}
