//! End-to-end import over the embedded adapter.

use std::sync::Arc;

use citystore::cache::IdCacheManager;
use citystore::config::Settings;
use citystore::db::{DatabaseAdapter, SqliteAdapter, SqlValue};
use citystore::event::EventDispatcher;
use citystore::feature::{Feature, VecReader};
use citystore::filter::Literal;
use citystore::geometry::Envelope;
use citystore::pipeline::{CancellationToken, ImportOptions, Importer};
use citystore::schema::{Attribute, FeatureType, JoinKind, Relation, SchemaMapping};

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
                name: "generalizes_to".into(),
                target: "building".into(),
                join: JoinKind::SourceFk {
                    column: "generalizes_to_id".into(),
                },
                discriminator: None,
            },
        ],
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

struct Harness {
    adapter: Arc<SqliteAdapter>,
    importer: Importer,
}

fn harness(options: ImportOptions) -> Harness {
    let adapter = Arc::new(SqliteAdapter::in_memory().unwrap());
    let mapping = Arc::new(mapping());
    adapter.create_tables(&mapping).unwrap();

    let importer = Importer::new(
        Arc::clone(&adapter) as Arc<dyn DatabaseAdapter>,
        Arc::clone(&mapping),
        Arc::new(EventDispatcher::new().unwrap()),
        Arc::new(IdCacheManager::new(10_000, 2, 0.5)),
        options,
    );
    Harness { adapter, importer }
}

fn query_i64(adapter: &SqliteAdapter, sql: &str) -> Option<i64> {
    let mut conn = adapter.connect().unwrap();
    let rows = conn.query(sql).unwrap();
    match rows.first()?.get_at(0)? {
        SqlValue::Integer(n) => Some(*n),
        SqlValue::Null => None,
        other => panic!("unexpected value: {other:?}"),
    }
}

#[test]
fn features_and_attributes_land_in_their_tables() {
    let h = harness(ImportOptions::default());
    let reader = VecReader::new(vec![Feature::new("building", "b1")
        .with_attribute("height", Literal::Double(12.5))
        .with_envelope(Envelope::new(0.0, 0.0, 10.0, 10.0))]);

    let summary = h.importer.run(reader, CancellationToken::new()).unwrap();
    assert_eq!(summary.features, 1);
    assert_eq!(summary.failed, 0);

    let mut conn = h.adapter.connect().unwrap();
    let rows = conn
        .query("SELECT \"gmlid\", \"measured_height\", \"envelope\" FROM \"building\"")
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_text("gmlid").unwrap(), "b1");
    assert_eq!(
        rows[0].get("measured_height").unwrap(),
        &SqlValue::Real(12.5)
    );
    assert!(rows[0]
        .get_text("envelope")
        .unwrap()
        .starts_with("POLYGON(("));
}

#[test]
fn target_fk_children_carry_their_parents_id() {
    let h = harness(ImportOptions::default());
    let reader = VecReader::new(vec![Feature::new("building", "b1").with_child(
        "address",
        Feature::new("address", "a1").with_attribute("street", Literal::from("Main St")),
    )]);

    let summary = h.importer.run(reader, CancellationToken::new()).unwrap();
    assert_eq!(summary.failed, 0);

    let parent_id =
        query_i64(&h.adapter, "SELECT \"id\" FROM \"building\" WHERE \"gmlid\" = 'b1'").unwrap();
    let child_fk = query_i64(
        &h.adapter,
        "SELECT \"building_id\" FROM \"address\" WHERE \"gmlid\" = 'a1'",
    )
    .unwrap();
    assert_eq!(child_fk, parent_id);
}

#[test]
fn source_fk_children_are_written_before_their_parent() {
    let h = harness(ImportOptions::default());
    let reader = VecReader::new(vec![Feature::new("building", "b1")
        .with_child("generalizes_to", Feature::new("building", "b2"))]);

    let summary = h.importer.run(reader, CancellationToken::new()).unwrap();
    assert_eq!(summary.failed, 0);

    let child_id =
        query_i64(&h.adapter, "SELECT \"id\" FROM \"building\" WHERE \"gmlid\" = 'b2'").unwrap();
    let parent_fk = query_i64(
        &h.adapter,
        "SELECT \"generalizes_to_id\" FROM \"building\" WHERE \"gmlid\" = 'b1'",
    )
    .unwrap();
    assert_eq!(parent_fk, child_id);
}

#[test]
fn forward_references_are_resolved_after_the_feature_pass() {
    // b1 references b2 before b2 has been imported.
    let h = harness(ImportOptions {
        pool_size: 1,
        ..ImportOptions::default()
    });
    let reader = VecReader::new(vec![
        Feature::new("building", "b1").with_reference("generalizes_to", "b2"),
        Feature::new("building", "b2"),
    ]);

    let summary = h.importer.run(reader, CancellationToken::new()).unwrap();
    assert_eq!(summary.features, 2);
    assert_eq!(summary.resolved_refs, 1);
    assert_eq!(summary.broken_refs, 0);

    let target_id =
        query_i64(&h.adapter, "SELECT \"id\" FROM \"building\" WHERE \"gmlid\" = 'b2'").unwrap();
    let fk = query_i64(
        &h.adapter,
        "SELECT \"generalizes_to_id\" FROM \"building\" WHERE \"gmlid\" = 'b1'",
    )
    .unwrap();
    assert_eq!(fk, target_id);
}

#[test]
fn backward_references_link_immediately_from_the_cache() {
    let h = harness(ImportOptions {
        pool_size: 1,
        ..ImportOptions::default()
    });
    let reader = VecReader::new(vec![
        Feature::new("building", "b2"),
        Feature::new("building", "b1").with_reference("generalizes_to", "b2"),
    ]);

    let summary = h.importer.run(reader, CancellationToken::new()).unwrap();
    assert_eq!(summary.resolved_refs, 0);
    assert_eq!(summary.broken_refs, 0);

    let target_id =
        query_i64(&h.adapter, "SELECT \"id\" FROM \"building\" WHERE \"gmlid\" = 'b2'").unwrap();
    let fk = query_i64(
        &h.adapter,
        "SELECT \"generalizes_to_id\" FROM \"building\" WHERE \"gmlid\" = 'b1'",
    )
    .unwrap();
    assert_eq!(fk, target_id);
}

#[test]
fn dangling_references_are_broken_not_fatal() {
    let h = harness(ImportOptions::default());
    let reader = VecReader::new(vec![
        Feature::new("building", "b1").with_reference("generalizes_to", "never-imported")
    ]);

    let summary = h.importer.run(reader, CancellationToken::new()).unwrap();
    assert_eq!(summary.features, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.broken_refs, 1);

    // The row itself was committed.
    assert!(query_i64(
        &h.adapter,
        "SELECT \"id\" FROM \"building\" WHERE \"gmlid\" = 'b1'"
    )
    .is_some());
}

#[test]
fn unknown_feature_types_fail_the_feature_not_the_run() {
    let h = harness(ImportOptions::default());
    let reader = VecReader::new(vec![
        Feature::new("tunnel", "t1"),
        Feature::new("building", "b1"),
    ]);

    let summary = h.importer.run(reader, CancellationToken::new()).unwrap();
    assert_eq!(summary.features, 2);
    assert_eq!(summary.failed, 1);
    assert!(query_i64(
        &h.adapter,
        "SELECT \"id\" FROM \"building\" WHERE \"gmlid\" = 'b1'"
    )
    .is_some());
}

#[test]
fn parsed_settings_configure_a_run() {
    let settings: Settings = toml::from_str(
        r#"
        [database]
        dialect = "sqlite"
        connection_string = ":memory:"

        [import]
        pool_size = 3
        queue_size = 8

        [cache]
        cache_size = 1000
        concurrency_level = 2
        drain_factor = 0.5

        [resolver]
        retries = 2
        "#,
    )
    .unwrap();

    let options = ImportOptions::from(&settings);
    assert_eq!(options.pool_size, 3);
    assert_eq!(options.queue_size, 8);
    assert_eq!(options.resolver_retries, 2);

    let adapter = Arc::new(SqliteAdapter::in_memory().unwrap());
    let mapping = Arc::new(mapping());
    adapter.create_tables(&mapping).unwrap();

    let importer = Importer::new(
        Arc::clone(&adapter) as Arc<dyn DatabaseAdapter>,
        mapping,
        Arc::new(EventDispatcher::new().unwrap()),
        Arc::new(IdCacheManager::from(&settings.cache)),
        options,
    );
    let features: Vec<Feature> = (0..20)
        .map(|i| Feature::new("building", format!("b{i}")))
        .collect();
    let summary = importer
        .run(VecReader::new(features), CancellationToken::new())
        .unwrap();
    assert_eq!(summary.features, 20);
    assert_eq!(summary.failed, 0);

    let count = query_i64(&adapter, "SELECT COUNT(*) FROM \"building\"").unwrap();
    assert_eq!(count, 20);
}

#[test]
fn concurrent_import_writes_every_feature() {
    let h = harness(ImportOptions {
        pool_size: 4,
        queue_size: 16,
        resolver_retries: 1,
    });
    let features: Vec<Feature> = (0..100)
        .map(|i| Feature::new("building", format!("b{i}")))
        .collect();

    let summary = h
        .importer
        .run(VecReader::new(features), CancellationToken::new())
        .unwrap();
    assert_eq!(summary.features, 100);
    assert_eq!(summary.failed, 0);

    let count = query_i64(&h.adapter, "SELECT COUNT(*) FROM \"building\"").unwrap();
    assert_eq!(count, 100);
}
