use std::cmp::Ordering;

use bson::{Bson, doc, oid::ObjectId};
use montylite::engine::Weighted;
use montylite::engine::weighted::{cmp_values, values_equal};

#[test]
fn type_brackets_order_values() {
    let ordered = [
        Bson::MinKey,
        Bson::Null,
        Bson::Int32(-5),
        Bson::Double(2.5),
        Bson::String("a".into()),
        Bson::Document(doc! {"a": 1}),
        Bson::Array(vec![Bson::Int32(1)]),
        Bson::ObjectId(ObjectId::new()),
        Bson::Boolean(false),
        Bson::DateTime(bson::DateTime::from_millis(0)),
        Bson::MaxKey,
    ];
    for pair in ordered.windows(2) {
        assert_eq!(cmp_values(&pair[0], &pair[1]), Ordering::Less, "{} < {}", pair[0], pair[1]);
    }
}

#[test]
fn numbers_compare_by_value() {
    assert!(values_equal(&Bson::Int32(3), &Bson::Double(3.0)));
    assert!(values_equal(&Bson::Int64(3), &Bson::Int32(3)));
    assert_eq!(cmp_values(&Bson::Int64(i64::MAX), &Bson::Double(1e300)), Ordering::Less);
    assert_eq!(cmp_values(&Bson::Double(f64::NAN), &Bson::Int32(i32::MIN)), Ordering::Less);
}

#[test]
fn documents_compare_by_entries_in_order() {
    let a = Bson::Document(doc! {"a": 1, "b": 2});
    let b = Bson::Document(doc! {"b": 2, "a": 1});
    assert!(!values_equal(&a, &b));
    assert_eq!(cmp_values(&a, &b), Ordering::Less);
    assert_eq!(cmp_values(&Bson::Document(doc! {"a": 1}), &a), Ordering::Less);
}

#[test]
fn weighted_keys_order_empty_array_below_null() {
    let mut keys = vec![Weighted::new(&Bson::Int32(1)), Weighted::null(), Weighted::empty_array()];
    keys.sort();
    assert_eq!(keys[0], Weighted::empty_array());
    assert_eq!(keys[1], Weighted::null());
    assert_eq!(keys[2].value(), Some(&Bson::Int32(1)));
    assert_eq!(Weighted::new(&Bson::Null), Weighted::null());
}
