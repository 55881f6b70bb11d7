//! Query aggregation.

use citystore::filter::{
    CounterFilter, Literal, Predicate, Query, SortProperty,
};
use citystore::schema::{Attribute, FeatureType, Relation, SchemaMapping, ValueReference};

fn mapping() -> SchemaMapping {
    let mut m = SchemaMapping::new();
    m.add_feature_type(FeatureType {
        name: "building".into(),
        table: "building".into(),
        id_column: "id".into(),
        gmlid_column: "gmlid".into(),
        envelope_column: Some("envelope".into()),
        attributes: vec![
            Attribute {
                name: "height".into(),
                column: "measured_height".into(),
                simple: true,
            },
            Attribute {
                name: "roof".into(),
                column: "roof_geometry".into(),
                simple: false,
            },
        ],
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

#[test]
fn second_filter_call_conjoins() {
    let m = mapping();
    let height = ValueReference::parse(&m, "building", "height").unwrap();
    let a = Predicate::equals(height.clone(), Literal::Integer(10));
    let b = Predicate::is_not_null(height);

    let query = Query::new("building").filter(a.clone()).filter(b.clone());
    let expected = Predicate::and([a, b]);
    assert!(query.selection().unwrap().is_equal_to(&expected));
}

#[test]
fn projection_preserves_order_and_deduplicates() {
    let m = mapping();
    let height = ValueReference::parse(&m, "building", "height").unwrap();
    let street = ValueReference::parse(&m, "building", "address.street").unwrap();

    let query = Query::new("building")
        .project(height.clone())
        .project(street.clone())
        .project(height.clone());

    let projected: Vec<String> = query.projection().iter().map(|r| r.to_string()).collect();
    assert_eq!(projected, ["building.height", "building.address.street"]);
}

#[test]
fn sort_keys_keep_declaration_order() {
    let m = mapping();
    let height = ValueReference::parse(&m, "building", "height").unwrap();
    let street = ValueReference::parse(&m, "building", "address.street").unwrap();

    let query = Query::new("building")
        .sort(SortProperty::descending(height).unwrap())
        .sort(SortProperty::ascending(street).unwrap());

    let targets: Vec<String> = query
        .sorting()
        .iter()
        .map(|s| s.target().to_string())
        .collect();
    assert_eq!(targets, ["building.height", "building.address.street"]);
}

#[test]
fn sorting_rejects_complex_attributes() {
    let m = mapping();
    let roof = ValueReference::parse(&m, "building", "roof").unwrap();
    assert!(SortProperty::ascending(roof).is_err());
}

#[test]
fn cloned_query_is_independent() {
    let m = mapping();
    let height = ValueReference::parse(&m, "building", "height").unwrap();

    let template = Query::new("building")
        .counter(CounterFilter::with_count(50).unwrap())
        .target_srid(4326);
    let narrowed = template
        .clone()
        .filter(Predicate::is_null(height));

    assert!(template.selection().is_none());
    assert!(narrowed.selection().is_some());
    assert_eq!(template.srid(), Some(4326));
    assert_eq!(template.counter_filter().unwrap().count(), 50);
}
