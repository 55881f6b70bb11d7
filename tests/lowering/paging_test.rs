//! Paging lowering: offset and keyed windows.

use citystore::filter::{
    ComparisonOperator, CounterFilter, Literal, Predicate, Query,
};
use citystore::schema::{Attribute, FeatureType, SchemaMapping, ValueReference};
use citystore::sql::test_utils::validate_sql;
use citystore::sql::{Dialect, QueryBuilder};

fn mapping() -> SchemaMapping {
    let mut m = SchemaMapping::new();
    m.add_feature_type(FeatureType {
        name: "building".into(),
        table: "building".into(),
        id_column: "id".into(),
        gmlid_column: "gmlid".into(),
        envelope_column: None,
        attributes: vec![Attribute {
            name: "height".into(),
            column: "measured_height".into(),
            simple: true,
        }],
        relations: vec![],
    });
    m
}

#[test]
fn count_alone_emits_a_bare_limit() {
    let m = mapping();
    let query = Query::new("building").counter(CounterFilter::with_count(25).unwrap());
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.ends_with("LIMIT 25"));
    assert!(!sql.contains("OFFSET"));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn one_based_limits_emit_limit_offset() {
    let m = mapping();
    let query = Query::new("building").counter(CounterFilter::new(11, 20).unwrap());
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.ends_with("LIMIT 10 OFFSET 10"));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn oracle_pages_with_offset_fetch() {
    let m = mapping();
    let query = Query::new("building").counter(CounterFilter::new(11, 20).unwrap());
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Oracle);

    assert!(sql.ends_with("OFFSET 10 ROWS FETCH NEXT 10 ROWS ONLY"));
    validate_sql(&sql, Dialect::Oracle);
}

#[test]
fn keyed_paging_windows_by_id_and_sorts_by_id() {
    let m = mapping();
    let mut counter = CounterFilter::with_count(100).unwrap();
    counter.set_start_id(5000);
    let query = Query::new("building").counter(counter);
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.contains("WHERE \"t0\".\"id\" > 5000"));
    assert!(sql.contains("ORDER BY \"t0\".\"id\" ASC"));
    assert!(sql.ends_with("LIMIT 100"));
    assert!(!sql.contains("OFFSET"));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn keyed_paging_conjoins_with_the_existing_selection() {
    let m = mapping();
    let height = ValueReference::parse(&m, "building", "height").unwrap();
    let mut counter = CounterFilter::with_count(10).unwrap();
    counter.set_start_id(42);

    let query = Query::new("building")
        .filter(Predicate::equals(height, Literal::Integer(12)))
        .counter(counter);
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.contains(
        "WHERE (\"t0\".\"measured_height\" = 12) AND \"t0\".\"id\" > 42"
    ));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn keyed_paging_respects_the_configured_operator() {
    let m = mapping();
    let mut counter = CounterFilter::with_count(10).unwrap();
    counter.set_start_id(42);
    counter.set_operator(ComparisonOperator::Lt);

    let query = Query::new("building").counter(counter);
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);
    assert!(sql.contains("WHERE \"t0\".\"id\" < 42"));
}

#[test]
fn count_statements_ignore_paging() {
    let m = mapping();
    let mut counter = CounterFilter::new(11, 20).unwrap();
    counter.set_start_id(5000);
    let query = Query::new("building").counter(counter);
    let sql = QueryBuilder::new(&m)
        .build_count(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert_eq!(sql, "SELECT COUNT(*) FROM \"building\" \"t0\"");
    validate_sql(&sql, Dialect::Postgres);
}
