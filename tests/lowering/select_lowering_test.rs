//! Lowering queries to SELECT statements.

use citystore::filter::{Literal, Predicate, Query};
use citystore::schema::{
    Attribute, FeatureType, JoinKind, NodeCondition, Relation, SchemaMapping, SchemaPath,
    ValueReference,
};
use citystore::sql::test_utils::validate_sql;
use citystore::sql::{Dialect, QueryBuildError, QueryBuilder};

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
        relations: vec![
            Relation {
                name: "address".into(),
                target: "address".into(),
                join: JoinKind::TargetFk {
                    column: "building_id".into(),
                },
                discriminator: None,
            },
            Relation {
                name: "postal_address".into(),
                target: "address".into(),
                join: JoinKind::TargetFk {
                    column: "building_id".into(),
                },
                discriminator: Some(("kind".into(), "postal".into())),
            },
        ],
    });
    m.add_feature_type(FeatureType {
        name: "address".into(),
        table: "address".into(),
        id_column: "id".into(),
        gmlid_column: "gmlid".into(),
        envelope_column: None,
        attributes: vec![
            Attribute {
                name: "street".into(),
                column: "street".into(),
                simple: true,
            },
            Attribute {
                name: "kind".into(),
                column: "kind".into(),
                simple: true,
            },
        ],
        relations: vec![],
    });
    m
}

#[test]
fn bare_query_selects_ids_from_aliased_root() {
    let m = mapping();
    let sql = QueryBuilder::new(&m)
        .build_select(&Query::new("building"))
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert_eq!(
        sql,
        "SELECT \"t0\".\"id\", \"t0\".\"gmlid\" FROM \"building\" \"t0\""
    );
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn comparison_predicates_lower_to_where() {
    let m = mapping();
    let height = ValueReference::parse(&m, "building", "height").unwrap();
    let query = Query::new("building").filter(Predicate::equals(height, Literal::Integer(12)));
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.contains("WHERE \"t0\".\"measured_height\" = 12"));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn identical_relation_hops_share_one_join() {
    let m = mapping();
    let street = ValueReference::parse(&m, "building", "address.street").unwrap();
    let gmlid = ValueReference::parse(&m, "building", "address.gmlid").unwrap();

    let query = Query::new("building")
        .filter(Predicate::equals(street, Literal::from("Main St")))
        .filter(Predicate::is_not_null(gmlid));
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert_eq!(sql.matches("INNER JOIN").count(), 1);
    assert!(
        sql.contains("INNER JOIN \"address\" \"t1\" ON \"t1\".\"building_id\" = \"t0\".\"id\"")
    );
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn distinct_conditions_get_distinct_joins() {
    let m = mapping();
    let plain = ValueReference::parse(&m, "building", "address.street").unwrap();

    let mut conditioned_path = SchemaPath::new(&m, "building").unwrap();
    conditioned_path
        .append(
            &m,
            "address",
            Some(NodeCondition::Equals {
                attribute: "kind".into(),
                value: Literal::from("postal"),
            }),
        )
        .unwrap()
        .append(&m, "street", None)
        .unwrap();
    let conditioned = ValueReference::new(conditioned_path).unwrap();

    let query = Query::new("building")
        .filter(Predicate::is_not_null(plain))
        .filter(Predicate::is_not_null(conditioned));
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert_eq!(sql.matches("INNER JOIN").count(), 2);
    assert!(sql.contains("\"t2\".\"kind\" = 'postal'"));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn discriminators_narrow_the_join_condition() {
    let m = mapping();
    let street = ValueReference::parse(&m, "building", "postal_address.street").unwrap();
    let query = Query::new("building").filter(Predicate::is_not_null(street));
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.contains(
        "ON \"t1\".\"building_id\" = \"t0\".\"id\" AND \"t1\".\"kind\" = 'postal'"
    ));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn not_wraps_its_operand() {
    let m = mapping();
    let height = ValueReference::parse(&m, "building", "height").unwrap();
    let query = Query::new("building")
        .filter(Predicate::equals(height, Literal::Integer(10)).negate());
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.contains("WHERE NOT (\"t0\".\"measured_height\" = 10)"));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn empty_resource_ids_select_nothing() {
    let m = mapping();
    let query = Query::new("building").filter(Predicate::resource_ids(Vec::<String>::new()));
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.ends_with("WHERE 1 = 0"));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn resource_ids_lower_to_a_sorted_in_list() {
    let m = mapping();
    let query = Query::new("building").filter(Predicate::resource_ids(["b2", "b1"]));
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.contains("\"t0\".\"gmlid\" IN ('b1', 'b2')"));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn raw_sql_is_guarded_behind_an_id_subquery() {
    let m = mapping();
    let query = Query::new("building").filter(Predicate::raw_sql(
        "SELECT \"id\" FROM \"building\" WHERE \"measured_height\" > 100",
    ));
    let sql = QueryBuilder::new(&m)
        .build_select(&query)
        .unwrap()
        .to_sql(Dialect::Postgres);

    assert!(sql.contains("\"t0\".\"id\" IN (SELECT \"sub\".\"id\" FROM ("));
    validate_sql(&sql, Dialect::Postgres);
}

#[test]
fn count_is_distinct_only_under_joins() {
    let m = mapping();
    let street = ValueReference::parse(&m, "building", "address.street").unwrap();

    let joined = Query::new("building").filter(Predicate::is_not_null(street));
    let sql = QueryBuilder::new(&m)
        .build_count(&joined)
        .unwrap()
        .to_sql(Dialect::Postgres);
    assert!(sql.starts_with("SELECT COUNT(DISTINCT \"t0\".\"id\")"));
    validate_sql(&sql, Dialect::Postgres);

    let plain = QueryBuilder::new(&m)
        .build_count(&Query::new("building"))
        .unwrap()
        .to_sql(Dialect::Postgres);
    assert!(plain.starts_with("SELECT COUNT(*)"));
    validate_sql(&plain, Dialect::Postgres);
}

#[test]
fn root_mismatch_is_rejected() {
    let m = mapping();
    let street = ValueReference::parse(&m, "address", "street").unwrap();
    let query = Query::new("building").filter(Predicate::is_not_null(street));
    assert!(matches!(
        QueryBuilder::new(&m).build_select(&query),
        Err(QueryBuildError::RootMismatch { .. })
    ));
}

#[test]
fn empty_logical_predicate_is_rejected() {
    let m = mapping();
    let query = Query::new("building").filter(Predicate::and([]));
    assert!(matches!(
        QueryBuilder::new(&m).build_select(&query),
        Err(QueryBuildError::EmptyLogical)
    ));
}
