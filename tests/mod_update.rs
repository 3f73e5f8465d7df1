use bson::{Bson, Decimal128, Document, doc};
use montylite::{DbError, MontyClient, UpdateOptions};

fn collection() -> montylite::Collection {
    MontyClient::memory().database("test").unwrap().collection("upd").unwrap()
}

#[test]
fn set_unset_and_inc() {
    let col = collection();
    col.insert_one(doc! {"_id": 1, "a": 1, "b": {"c": 1}, "gone": true}).unwrap();
    let r = col
        .update_one(&doc! {"_id": 1}, &doc! {"$inc": {"a": 2, "b.c": 1}, "$set": {"d.e": "x"}, "$unset": {"gone": ""}}, UpdateOptions::default())
        .unwrap();
    assert_eq!((r.matched_count, r.modified_count), (1, 1));
    let d = col.find_one(&doc! {"_id": 1}, None).unwrap().unwrap();
    assert_eq!(d, doc! {"_id": 1, "a": 3, "b": {"c": 2}, "d": {"e": "x"}});
    assert_eq!(keys(&d), ["_id", "a", "b", "d"]);
}

fn keys(d: &Document) -> Vec<&str> {
    d.keys().map(String::as_str).collect()
}

#[test]
fn set_keeps_key_position_and_rename_appends() {
    let col = collection();
    col.insert_one(doc! {"_id": 1, "a": 1, "b": 2, "c": 3}).unwrap();
    col.update_one(&doc! {"_id": 1}, &doc! {"$set": {"a": 10, "z": 0}}, UpdateOptions::default()).unwrap();
    let d = col.find_one(&doc! {"_id": 1}, None).unwrap().unwrap();
    assert_eq!(keys(&d), ["_id", "a", "b", "c", "z"]);
    col.update_one(&doc! {"_id": 1}, &doc! {"$rename": {"a": "y"}}, UpdateOptions::default()).unwrap();
    let d = col.find_one(&doc! {"_id": 1}, None).unwrap().unwrap();
    assert_eq!(keys(&d), ["_id", "b", "c", "z", "y"]);
    assert_eq!(d.get_i32("y").unwrap(), 10);
}

#[test]
fn decimal_arithmetic_is_exact() {
    let dec = |s: &str| Bson::Decimal128(s.parse::<Decimal128>().unwrap());
    let col = collection();
    col.insert_one(doc! {"_id": 1, "d": dec("0.1"), "i": 2}).unwrap();
    col.update_one(&doc! {"_id": 1}, &doc! {"$inc": {"d": dec("0.2"), "i": dec("0.5")}}, UpdateOptions::default())
        .unwrap();
    let d = col.find_one(&doc! {"_id": 1}, None).unwrap().unwrap();
    assert_eq!(d.get("d").unwrap().to_string(), dec("0.3").to_string());
    assert!(matches!(d.get("i"), Some(Bson::Decimal128(_))));
    assert_eq!(col.count_documents(&doc! {"d": {"$gt": 0.29, "$lt": 0.31}}).unwrap(), 1);
    assert_eq!(col.count_documents(&doc! {"i": 2.5}).unwrap(), 1);
}

#[test]
fn noop_update_reports_matched_but_not_modified() {
    let col = collection();
    col.insert_one(doc! {"_id": 1, "a": 1}).unwrap();
    let r = col.update_one(&doc! {"a": 1}, &doc! {"$set": {"a": 1}}, UpdateOptions::default()).unwrap();
    assert_eq!((r.matched_count, r.modified_count), (1, 0));
    let r = col.update_one(&doc! {"a": 1}, &doc! {"$set": {"a": 1.0}}, UpdateOptions::default()).unwrap();
    assert_eq!(r.modified_count, 1);
}

#[test]
fn positional_operator_updates_matched_element() {
    let col = collection();
    col.insert_one(doc! {"_id": 1, "grades": [80, 85, 90]}).unwrap();
    col.update_one(&doc! {"grades": 85}, &doc! {"$set": {"grades.$": 86}}, UpdateOptions::default()).unwrap();
    let d = col.find_one(&doc! {}, None).unwrap().unwrap();
    assert_eq!(d.get_array("grades").unwrap(), &vec![Bson::Int32(80), Bson::Int32(86), Bson::Int32(90)]);
}

#[test]
fn all_positional_and_array_filters() {
    let col = collection();
    col.insert_one(doc! {"_id": 1, "a": [1, 2, 3], "b": [{"v": 1}, {"v": 5}]}).unwrap();
    let opts = UpdateOptions { upsert: false, array_filters: vec![doc! {"big.v": {"$gt": 2}}] };
    col.update_one(&doc! {}, &doc! {"$inc": {"a.$[]": 10}, "$set": {"b.$[big].v": 0}}, opts).unwrap();
    let d = col.find_one(&doc! {}, None).unwrap().unwrap();
    assert_eq!(d, doc! {"_id": 1, "a": [11, 12, 13], "b": [{"v": 1}, {"v": 0}]});
}

#[test]
fn min_max_mul_and_set_on_insert() {
    let col = collection();
    col.insert_one(doc! {"_id": 1, "lo": 5, "hi": 5, "m": 3}).unwrap();
    col.update_one(
        &doc! {"_id": 1},
        &doc! {"$min": {"lo": 2}, "$max": {"hi": 1}, "$mul": {"m": 2, "n": 4}, "$setOnInsert": {"created": true}},
        UpdateOptions::default(),
    )
    .unwrap();
    let d = col.find_one(&doc! {"_id": 1}, None).unwrap().unwrap();
    assert_eq!(d, doc! {"_id": 1, "lo": 2, "hi": 5, "m": 6, "n": 0});
}

#[test]
fn array_modifiers() {
    let col = collection();
    col.insert_one(doc! {"_id": 1, "a": [1, 2, 3, 2], "s": ["x"], "p": [1, 2, 3]}).unwrap();
    col.update_one(
        &doc! {"_id": 1},
        &doc! {"$pullAll": {"a": [2]}, "$addToSet": {"s": "y"}, "$pop": {"p": -1}},
        UpdateOptions::default(),
    )
    .unwrap();
    let d = col.find_one(&doc! {"_id": 1}, None).unwrap().unwrap();
    assert_eq!(d, doc! {"_id": 1, "a": [1, 3], "s": ["x", "y"], "p": [2, 3]});
}

#[test]
fn current_date_sets_a_date() {
    let col = collection();
    col.insert_one(doc! {"_id": 1}).unwrap();
    col.update_one(&doc! {"_id": 1}, &doc! {"$currentDate": {"at": true}}, UpdateOptions::default()).unwrap();
    let d = col.find_one(&doc! {"_id": 1}, None).unwrap().unwrap();
    assert!(matches!(d.get("at"), Some(Bson::DateTime(_))));
}

#[test]
fn upsert_seeds_from_filter_equalities() {
    let col = collection();
    let opts = UpdateOptions { upsert: true, array_filters: vec![] };
    let r = col
        .update_one(&doc! {"name": "ann", "age": {"$gt": 3}}, &doc! {"$set": {"x": 1}, "$setOnInsert": {"new": true}}, opts)
        .unwrap();
    assert_eq!(r.matched_count, 0);
    let id = r.upserted_id.expect("upserted");
    let d = col.find_one(&doc! {"_id": id}, Some(doc! {"_id": 0})).unwrap().unwrap();
    assert_eq!(d, doc! {"name": "ann", "x": 1, "new": true});
}

#[test]
fn update_many_stops_at_first_failure() {
    let col = collection();
    col.insert_many(vec![doc! {"_id": 1, "a": 1}, doc! {"_id": 2, "a": "s"}, doc! {"_id": 3, "a": 1}], true).unwrap();
    let err = col.update_many(&doc! {}, &doc! {"$inc": {"a": 1}}, UpdateOptions::default()).unwrap_err();
    match err {
        DbError::BulkWrite { n_modified, index, ref source, .. } => {
            assert_eq!(n_modified, 1);
            assert_eq!(index, 1);
            assert_eq!(source.code(), Some(14));
        }
        other => panic!("unexpected: {other:?}"),
    }
    let d1 = col.find_one(&doc! {"_id": 1}, None).unwrap().unwrap();
    let d3 = col.find_one(&doc! {"_id": 3}, None).unwrap().unwrap();
    assert_eq!(d1.get_i32("a").unwrap(), 2);
    assert_eq!(d3.get_i32("a").unwrap(), 1);
}

#[test]
fn compile_errors_surface_before_any_write() {
    let col = collection();
    col.insert_one(doc! {"_id": 1, "a": 1}).unwrap();
    let cases = [
        (doc! {"a": 2}, 2),
        (doc! {"$bogus": {"a": 1}}, 9),
        (doc! {"$set": {"a": 1}, "$unset": {"a": ""}}, 40),
        (doc! {"$set": {"_id": 2}}, 66),
    ];
    for (update, code) in cases {
        let err = col.update_one(&doc! {"_id": 1}, &update, UpdateOptions::default()).unwrap_err();
        assert_eq!(err.code(), Some(code), "{update}");
    }
    assert_eq!(col.find_one(&doc! {}, None).unwrap().unwrap(), doc! {"_id": 1, "a": 1});
}
