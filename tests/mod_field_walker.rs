use bson::{Bson, Document, doc};
use montylite::engine::field_walker::{FieldPath, FieldWalker, NoArrayFilters};

fn values(d: &Document, path: &str) -> Vec<Bson> {
    FieldWalker::new(d).get(path).elements().iter().map(|h| h.value.clone()).collect()
}

#[test]
fn reads_broadcast_through_document_arrays() {
    let d = doc! {"a": [{"b": 1}, {"b": [2, 3]}, {"c": 4}, 5]};
    assert_eq!(values(&d, "a.b"), vec![Bson::Int32(1), Bson::Int32(2), Bson::Int32(3)]);
    let v = FieldWalker::new(&d).get("a.b");
    assert!(v.exists());
    assert!(v.array_field_missing());
    assert_eq!(v.arrays().len(), 1);
}

#[test]
fn numeric_segment_reads_index_and_field() {
    let d = doc! {"a": [{"0": "key"}, "second"]};
    assert_eq!(values(&d, "a.0"), vec![Bson::String("key".into()), Bson::Document(doc! {"0": "key"})]);
    assert_eq!(values(&d, "a.1"), vec![Bson::String("second".into())]);
}

#[test]
fn missing_paths() {
    let d = doc! {"a": 1, "b": {"c": null}};
    let v = FieldWalker::new(&d).get("a.x");
    assert!(!v.exists());
    assert!(v.null_or_missing());
    assert!(FieldWalker::new(&d).get("b.c").null_or_missing());
    assert!(FieldWalker::new(&d).get("b.c").exists());
}

#[test]
fn staged_writes_apply_together() {
    let mut d = doc! {"a": {"b": 1}, "list": [1, 2]};
    let staged = {
        let mut w = FieldWalker::new(&d);
        w.set(&FieldPath::parse_update("a.c").unwrap(), &Bson::Int32(2), &NoArrayFilters).unwrap();
        w.set(&FieldPath::parse_update("list.3").unwrap(), &Bson::Int32(4), &NoArrayFilters).unwrap();
        w.drop(&FieldPath::parse_update("a.b").unwrap(), &NoArrayFilters).unwrap();
        w.into_staged()
    };
    staged.commit(&mut d).unwrap();
    assert_eq!(d, doc! {"a": {"c": 2}, "list": [1, 2, null, 4]});
}

#[test]
fn update_paths_are_validated() {
    assert_eq!(FieldPath::parse_update("").unwrap_err().code(), Some(56));
    assert!(FieldPath::parse_update("a..b").is_err());
    assert!(FieldPath::parse_update("a.$[x].b").unwrap().has_array_operator());
    assert_eq!(FieldPath::parse_update("a.$[x].$[y]").unwrap().identifiers(), vec!["x", "y"]);
}
