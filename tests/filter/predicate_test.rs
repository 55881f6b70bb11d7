//! Predicate construction and semantic equality.

use citystore::filter::{
    ComparisonOperator, FilterError, Literal, Predicate, SpatialOperator,
};
use citystore::geometry::Envelope;
use citystore::schema::{Attribute, FeatureType, Relation, SchemaMapping, ValueReference};

fn mapping() -> SchemaMapping {
    let mut m = SchemaMapping::new();
    m.add_feature_type(FeatureType {
        name: "building".into(),
        table: "building".into(),
        id_column: "id".into(),
        gmlid_column: "gmlid".into(),
        envelope_column: Some("envelope".into()),
        attributes: vec![Attribute {
            name: "height".into(),
            column: "measured_height".into(),
            simple: true,
        }],
        relations: vec![Relation {
            name: "address".into(),
            target: "address".into(),
            join: citystore::schema::JoinKind::TargetFk {
                column: "building_id".into(),
            },
            discriminator: None,
        }],
    });
    m.add_feature_type(FeatureType {
        name: "address".into(),
        table: "address".into(),
        id_column: "id".into(),
        gmlid_column: "gmlid".into(),
        envelope_column: None,
        attributes: vec![Attribute {
            name: "street".into(),
            column: "street".into(),
            simple: true,
        }],
        relations: vec![],
    });
    m
}

fn height(m: &SchemaMapping) -> ValueReference {
    ValueReference::parse(m, "building", "height").unwrap()
}

#[test]
fn symmetric_operators_ignore_operand_order() {
    let m = mapping();
    let a = Predicate::equals(height(&m), Literal::Integer(12));
    let b = Predicate::equals(Literal::Integer(12), height(&m));

    assert!(a.is_equal_to(&b));
    // Structural equality still distinguishes them.
    assert_ne!(a, b);
}

#[test]
fn asymmetric_operators_respect_operand_order() {
    let m = mapping();
    let lt = Predicate::compare(ComparisonOperator::Lt, height(&m), Literal::Integer(12));
    let swapped = Predicate::compare(ComparisonOperator::Lt, Literal::Integer(12), height(&m));
    assert!(!lt.is_equal_to(&swapped));
}

#[test]
fn logical_equality_is_a_multiset() {
    let m = mapping();
    let p = Predicate::equals(height(&m), Literal::Integer(1));
    let q = Predicate::is_null(height(&m));

    assert!(Predicate::and([p.clone(), q.clone()])
        .is_equal_to(&Predicate::and([q.clone(), p.clone()])));
    assert!(!Predicate::and([p.clone(), q.clone()]).is_equal_to(&Predicate::or([p, q])));
}

#[test]
fn duplicate_operands_must_match_one_to_one() {
    let m = mapping();
    let p = Predicate::equals(height(&m), Literal::Integer(1));
    let q = Predicate::equals(height(&m), Literal::Integer(2));

    let two_p = Predicate::and([p.clone(), p.clone()]);
    let p_and_q = Predicate::and([p, q]);
    assert!(!two_p.is_equal_to(&p_and_q));
}

#[test]
fn between_carries_both_bounds() {
    let m = mapping();
    let between = Predicate::between(height(&m), Literal::Integer(5), Literal::Integer(10));
    let reversed = Predicate::between(height(&m), Literal::Integer(10), Literal::Integer(5));
    assert!(!between.is_equal_to(&reversed));
}

#[test]
fn double_literal_rejects_non_finite() {
    assert!(Literal::double(33.2).is_ok());
    assert!(matches!(
        Literal::double(f64::NAN),
        Err(FilterError::NonFiniteLiteral(_))
    ));
    assert!(Literal::double(f64::NEG_INFINITY).is_err());
}

#[test]
fn reset_returns_to_empty_state() {
    let m = mapping();
    let mut p = Predicate::and([Predicate::equals(height(&m), Literal::Integer(1))]);
    p.reset();
    assert!(matches!(&p, Predicate::Logical(l) if l.operands.is_empty()));

    let mut ids = Predicate::resource_ids(["b1", "b2"]);
    ids.reset();
    assert!(matches!(&ids, Predicate::ResourceId(r) if r.is_empty()));
}

#[test]
fn clone_is_deep() {
    let m = mapping();
    let mut original = Predicate::or([
        Predicate::equals(height(&m), Literal::Integer(1)),
        Predicate::bbox(
            SpatialOperator::BboxIntersects,
            Envelope::new(0.0, 0.0, 1.0, 1.0),
        ),
    ]);
    let copy = original.clone();
    original.reset();

    assert!(matches!(&copy, Predicate::Logical(l) if l.operands.len() == 2));
    assert!(matches!(&original, Predicate::Logical(l) if l.operands.is_empty()));
}

#[test]
fn resource_ids_deduplicate() {
    let p = Predicate::resource_ids(["b1", "b2", "b1"]);
    assert!(matches!(&p, Predicate::ResourceId(r) if r.ids.len() == 2));
}
