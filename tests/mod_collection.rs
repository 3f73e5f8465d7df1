use bson::{Bson, doc};
use montylite::{DbError, FindOptions, MontyClient};

#[test]
fn insert_assigns_object_id_first() {
    let col = MontyClient::memory().database("test").unwrap().collection("c").unwrap();
    let r = col.insert_one(doc! {"x": 1}).unwrap();
    assert!(matches!(r.inserted_id, Bson::ObjectId(_)));
    let d = col.find_one(&doc! {}, None).unwrap().unwrap();
    assert_eq!(d.keys().next().map(String::as_str), Some("_id"));
}

#[test]
fn duplicate_ids_are_rejected() {
    let col = MontyClient::memory().database("test").unwrap().collection("c").unwrap();
    col.insert_one(doc! {"_id": 1}).unwrap();
    let err = col.insert_one(doc! {"_id": 1_i64}).unwrap_err();
    assert!(matches!(err, DbError::DuplicateKey { .. }));
    assert_eq!(err.code(), Some(11000));
}

#[test]
fn invalid_documents_are_rejected() {
    let col = MontyClient::memory().database("test").unwrap().collection("c").unwrap();
    assert!(matches!(col.insert_one(doc! {"$a": 1}), Err(DbError::InvalidDocument(_))));
    assert!(matches!(col.insert_one(doc! {"a": {"b.c": 1}}), Err(DbError::InvalidDocument(_))));
    assert!(matches!(col.insert_one(doc! {"_id": [1]}), Err(DbError::InvalidDocument(_))));
}

#[test]
fn ordered_and_unordered_batches() {
    let db = MontyClient::memory().database("test").unwrap();
    let ordered = db.collection("o").unwrap();
    let batch = || vec![doc! {"_id": 1}, doc! {"_id": 1}, doc! {"_id": 2}];
    match ordered.insert_many(batch(), true).unwrap_err() {
        DbError::BulkWrite { n_inserted, index, .. } => assert_eq!((n_inserted, index), (1, 1)),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(ordered.count_documents(&doc! {}).unwrap(), 1);

    let unordered = db.collection("u").unwrap();
    match unordered.insert_many(batch(), false).unwrap_err() {
        DbError::BulkWrite { n_inserted, index, .. } => assert_eq!((n_inserted, index), (2, 1)),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(unordered.count_documents(&doc! {}).unwrap(), 2);
}

#[test]
fn distinct_unwinds_arrays_and_merges_numbers() {
    let col = MontyClient::memory().database("test").unwrap().collection("c").unwrap();
    col.insert_many(
        vec![doc! {"t": [1, 2]}, doc! {"t": 2.0}, doc! {"t": "x"}, doc! {"u": 1}, doc! {"t": 3, "skip": true}],
        true,
    )
    .unwrap();
    let values = col.distinct("t", &doc! {"skip": {"$exists": false}}).unwrap();
    assert_eq!(values, vec![Bson::Int32(1), Bson::Int32(2), Bson::String("x".into())]);
}

#[test]
fn delete_one_and_many() {
    let col = MontyClient::memory().database("test").unwrap().collection("c").unwrap();
    col.insert_many((0..5).map(|i| doc! {"_id": i, "even": i % 2 == 0}).collect(), true).unwrap();
    assert_eq!(col.delete_one(&doc! {"even": true}).unwrap().deleted_count, 1);
    assert_eq!(col.delete_many(&doc! {"even": true}).unwrap().deleted_count, 2);
    assert_eq!(col.delete_many(&doc! {"even": true}).unwrap().deleted_count, 0);
    assert_eq!(col.count_documents(&doc! {}).unwrap(), 2);
    // A deleted id can be reused.
    col.insert_one(doc! {"_id": 0}).unwrap();
}

#[test]
fn database_lists_and_drops_collections() {
    let client = MontyClient::memory();
    let db = client.database("shop").unwrap();
    db.collection("b").unwrap().insert_one(doc! {}).unwrap();
    db.collection("a").unwrap().insert_one(doc! {}).unwrap();
    client.database("other").unwrap().collection("z").unwrap().insert_one(doc! {}).unwrap();
    assert_eq!(db.list_collection_names().unwrap(), vec!["a".to_string(), "b".to_string()]);
    assert!(db.drop_collection("a").unwrap());
    assert!(!db.drop_collection("a").unwrap());
    assert_eq!(db.list_collection_names().unwrap(), vec!["b".to_string()]);
}

#[test]
fn names_are_validated() {
    let client = MontyClient::memory();
    assert!(client.database("").is_err());
    assert!(client.database("a.b").is_err());
    let db = client.database("ok").unwrap();
    assert!(db.collection("bad$name").is_err());
    assert!(db.collection("fine.sub").is_ok());
}

#[test]
fn find_one_applies_projection() {
    let col = MontyClient::memory().database("test").unwrap().collection("c").unwrap();
    col.insert_one(doc! {"_id": 1, "a": 1, "b": 2}).unwrap();
    assert_eq!(col.find_one(&doc! {"a": 1}, Some(doc! {"b": 1})).unwrap(), Some(doc! {"_id": 1, "b": 2}));
    assert_eq!(col.find_one(&doc! {"a": 2}, None).unwrap(), None);
    let n = col.find(&doc! {}, FindOptions::default()).unwrap().count();
    assert_eq!(n, 1);
}
