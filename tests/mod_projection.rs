use bson::doc;
use montylite::{FindOptions, MontyClient};

fn seeded() -> montylite::Collection {
    let col = MontyClient::memory().database("test").unwrap().collection("proj").unwrap();
    col.insert_one(doc! {"_id": 1, "name": "a", "tags": ["x", "y", "z"], "info": {"age": 3, "city": "q"}, "scores": [{"s": 1}, {"s": 7}]})
        .unwrap();
    col
}

fn project(filter: bson::Document, projection: bson::Document) -> Result<bson::Document, montylite::DbError> {
    let col = seeded();
    let opts = FindOptions { projection: Some(projection), ..FindOptions::default() };
    Ok(col.find(&filter, opts)?.to_vec()?.remove(0))
}

#[test]
fn inclusion_with_nested_paths() {
    let out = project(doc! {}, doc! {"info.age": 1, "name": 1}).unwrap();
    assert_eq!(out, doc! {"_id": 1, "name": "a", "info": {"age": 3}});
}

#[test]
fn inclusion_follows_document_order() {
    let out = project(doc! {}, doc! {"tags": 1, "info.city": 1, "name": 1}).unwrap();
    assert_eq!(out.keys().collect::<Vec<_>>(), ["_id", "name", "tags", "info"]);
    let out = project(doc! {}, doc! {"info": 1, "_id": 0}).unwrap();
    assert_eq!(out.get_document("info").unwrap().keys().collect::<Vec<_>>(), ["age", "city"]);
}

#[test]
fn exclusion_without_id() {
    let out = project(doc! {}, doc! {"_id": 0, "tags": 0, "scores": 0, "info.city": 0}).unwrap();
    assert_eq!(out, doc! {"name": "a", "info": {"age": 3}});
}

#[test]
fn slice_and_positional() {
    let out = project(doc! {}, doc! {"tags": {"$slice": 2}, "_id": 0, "name": 0, "info": 0, "scores": 0}).unwrap();
    assert_eq!(out, doc! {"tags": ["x", "y"]});
    let out = project(doc! {}, doc! {"tags": {"$slice": -1.0}, "_id": 0, "name": 0, "info": 0, "scores": 0}).unwrap();
    assert_eq!(out, doc! {"tags": ["z"]});
    let out = project(doc! {"scores.s": {"$gt": 5}}, doc! {"scores.$": 1}).unwrap();
    assert_eq!(out, doc! {"_id": 1, "scores": [{"s": 7}]});
}

#[test]
fn elem_match_projection() {
    let out = project(doc! {}, doc! {"scores": {"$elemMatch": {"s": {"$lt": 5}}}, "name": 1}).unwrap();
    assert_eq!(out, doc! {"_id": 1, "name": "a", "scores": [{"s": 1}]});
}

#[test]
fn invalid_projections_fail_at_compile() {
    let col = seeded();
    let bad = [
        doc! {"a": 1, "b": 0},
        doc! {"a": 1, "a.b": 1},
        doc! {"tags.$": 1},
        doc! {"scores.$": 1, "tags": {"$elemMatch": {"$eq": "x"}}},
        doc! {"info.city": {"$elemMatch": {"a": 1}}},
        doc! {"tags": {"$slice": 2.7}},
        doc! {"tags": {"$slice": [0.5, 1]}},
    ];
    for spec in bad {
        let opts = FindOptions { projection: Some(spec.clone()), ..FindOptions::default() };
        let err = col.find(&doc! {"scores.s": 1}, opts).unwrap_err();
        assert_eq!(err.code(), Some(2), "{spec}");
    }
}
