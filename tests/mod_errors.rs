use bson::doc;
use montylite::errors::codes;
use montylite::{DbError, MontyClient, UpdateOptions};

#[test]
fn codes_are_exposed_per_variant() {
    assert_eq!(DbError::ExecutionTimeout.code(), Some(codes::MAX_TIME_EXPIRED));
    assert_eq!(DbError::DuplicateKey { namespace: "a.b".into(), key: "1".into() }.code(), Some(codes::DUPLICATE_KEY));
    assert_eq!(DbError::InvalidDocument("x".into()).code(), None);
    let bulk = DbError::BulkWrite {
        n_inserted: 0,
        n_modified: 0,
        index: 0,
        source: Box::new(DbError::ExecutionTimeout),
    };
    assert_eq!(bulk.code(), Some(codes::MAX_TIME_EXPIRED));
}

#[test]
fn duplicate_key_message_names_namespace_and_key() {
    let col = MontyClient::memory().database("shop").unwrap().collection("items").unwrap();
    col.insert_one(doc! {"_id": "k"}).unwrap();
    let msg = col.insert_one(doc! {"_id": "k"}).unwrap_err().to_string();
    assert!(msg.starts_with("E11000 duplicate key error collection: shop.items"), "{msg}");
}

#[test]
fn write_errors_carry_codes() {
    let col = MontyClient::memory().database("t").unwrap().collection("c").unwrap();
    col.insert_one(doc! {"_id": 1, "a": 5, "s": "x"}).unwrap();
    let cases = [
        (doc! {"$set": {"a.b": 1}}, codes::PATH_NOT_VIABLE),
        (doc! {"$inc": {"s": 1}}, codes::TYPE_MISMATCH),
        (doc! {"$push": {"a": 1}}, codes::BAD_VALUE),
        (doc! {"$set": {"_id": 9}}, codes::IMMUTABLE_FIELD),
    ];
    for (update, code) in cases {
        let err = col.update_one(&doc! {"_id": 1}, &update, UpdateOptions::default()).unwrap_err();
        assert!(matches!(err, DbError::WriteError { .. }), "{update}: {err:?}");
        assert_eq!(err.code(), Some(code), "{update}");
    }
}

#[test]
fn stored_keys_are_checked_on_update() {
    let col = MontyClient::memory().database("t").unwrap().collection("c").unwrap();
    col.insert_one(doc! {"_id": 1}).unwrap();
    let err = col
        .update_one(&doc! {}, &doc! {"$set": {"a": {"$x": 1}}}, UpdateOptions::default())
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::DOLLAR_PREFIXED_FIELD_NAME));
}
