use bson::{Document, doc};
use montylite::{CursorState, DbError, FindOptions, MontyClient};

fn seeded() -> montylite::Collection {
    let col = MontyClient::memory().database("test").unwrap().collection("cur").unwrap();
    let docs = vec![
        doc! {"_id": 1, "a": 3},
        doc! {"_id": 2, "a": 1},
        doc! {"_id": 3, "a": 2},
        doc! {"_id": 4, "a": null},
        doc! {"_id": 5, "a": []},
    ];
    col.insert_many(docs, true).unwrap();
    col
}

fn ids(docs: &[Document]) -> Vec<i32> {
    docs.iter().map(|d| d.get_i32("_id").unwrap()).collect()
}

#[test]
fn states_follow_the_pipeline() {
    let col = seeded();
    let mut cur = col.find(&doc! {"a": {"$gte": 2}}, FindOptions::default()).unwrap();
    assert_eq!(cur.state(), CursorState::Unstarted);
    assert!(cur.alive());
    assert!(cur.next_document().unwrap().is_some());
    assert_eq!(cur.state(), CursorState::Queried);
    assert!(cur.next_document().unwrap().is_some());
    assert_eq!(cur.state(), CursorState::Exhausted);
    assert!(!cur.alive());
    assert_eq!(cur.retrieved(), 2);
    assert!(cur.next_document().unwrap().is_none());
}

#[test]
fn options_are_frozen_after_first_pull() {
    let col = seeded();
    let mut cur = col.find(&doc! {}, FindOptions::default()).unwrap().sort(&doc! {"a": 1}).unwrap();
    cur.next_document().unwrap();
    let err = cur.limit(1).unwrap_err();
    assert!(matches!(err, DbError::InvalidOperation(_)));
}

#[test]
fn rewind_reruns_and_close_kills() {
    let col = seeded();
    let mut cur = col.find(&doc! {"_id": {"$lte": 2}}, FindOptions::default()).unwrap();
    assert_eq!(cur.by_ref().count(), 2);
    cur.rewind();
    assert_eq!(cur.state(), CursorState::Unstarted);
    assert_eq!(cur.retrieved(), 0);
    assert!(cur.next_document().unwrap().is_some());
    cur.close();
    assert_eq!(cur.state(), CursorState::Killed);
    assert!(cur.next_document().is_err());
    assert!(cur.next().is_none());
}

#[test]
fn sort_skip_limit() {
    let col = seeded();
    let docs = col
        .find(&doc! {}, FindOptions::default())
        .unwrap()
        .sort(&doc! {"a": 1})
        .unwrap()
        .skip(1)
        .unwrap()
        .limit(3)
        .unwrap()
        .to_vec()
        .unwrap();
    assert_eq!(ids(&docs), vec![4, 2, 3]);
}

#[test]
fn descending_sort_puts_empty_array_before_null() {
    let col = seeded();
    let opts = FindOptions { sort: Some(doc! {"a": -1}), ..FindOptions::default() };
    let docs = col.find(&doc! {}, opts).unwrap().to_vec().unwrap();
    // Descending, `[]` keys as an array value.
    assert_eq!(ids(&docs), vec![5, 1, 3, 2, 4]);
}

#[test]
fn negative_limit_is_a_hard_limit() {
    let col = seeded();
    let opts = FindOptions { sort: Some(doc! {"_id": -1}), limit: -2, ..FindOptions::default() };
    assert_eq!(ids(&col.find(&doc! {}, opts).unwrap().to_vec().unwrap()), vec![5, 4]);
}

#[test]
fn max_scan_bounds_the_read() {
    let col = seeded();
    let opts = FindOptions { max_scan: Some(2), ..FindOptions::default() };
    assert_eq!(col.find(&doc! {}, opts).unwrap().to_vec().unwrap().len(), 2);
}

#[test]
fn zero_time_budget_times_out_and_kills() {
    let col = seeded();
    let mut cur = col.find(&doc! {}, FindOptions::default()).unwrap().max_time_ms(0).unwrap();
    let err = cur.next_document().unwrap_err();
    assert!(matches!(err, DbError::ExecutionTimeout));
    assert_eq!(err.code(), Some(50));
    assert_eq!(cur.state(), CursorState::Killed);
}

#[test]
fn bad_sort_is_rejected() {
    let col = seeded();
    let err = col.find(&doc! {}, FindOptions::default()).unwrap().sort(&doc! {"a": 0}).unwrap_err();
    assert_eq!(err.code(), Some(2));
}
