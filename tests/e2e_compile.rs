//! End-to-end tests for the query compilers.
//!
//! Golden query text for ingestion, cleanup, matchlink and index statements,
//! plus the schema combinations the compilers must refuse.
//!
//! `MemoryStore` does not evaluate Cypher. Graph-level outcomes of these
//! queries, such as fresh children surviving a cascade delete or a second
//! Widget load followed by cleanup leaving only `w2`, are pinned here by query
//! text alone. Verifying them end to end needs a real graph store.

use cartography::cypher::render;
use cartography::querybuilder::{cleanup_queries, ingestion_query};
use cartography::{
    build_cleanup_queries, build_cleanup_query_for_matchlink, build_create_index_queries,
    build_create_index_queries_for_matchlink, build_ingestion_query, build_matchlink_query, Error, LinkDirection,
    ModuleInfo, NodeSchema, PropertyRef, RelSchema,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Fixtures
// ============================================================================

fn module() -> ModuleInfo {
    ModuleInfo::new("test", "1.0")
}

fn owner_rel() -> RelSchema {
    RelSchema::builder("Owner", "RESOURCE", LinkDirection::Inward)
        .target_matcher("id", PropertyRef::kwarg("OwnerId"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .module(module())
        .build()
        .unwrap()
}

fn tag_rel() -> RelSchema {
    RelSchema::builder("Tag", "TAGGED", LinkDirection::Outward)
        .target_matcher("name", PropertyRef::record("TagName").ignore_case())
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .module(module())
        .build()
        .unwrap()
}

fn widget() -> NodeSchema {
    NodeSchema::builder("Widget")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .sub_resource(owner_rel())
        .module(module())
        .build()
        .unwrap()
}

fn can_read() -> RelSchema {
    RelSchema::builder("Bucket", "CAN_READ", LinkDirection::Outward)
        .source("Principal")
        .source_matcher("id", PropertyRef::record("PrincipalId"))
        .target_matcher("id", PropertyRef::record("BucketId"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .property("_sub_resource_label", PropertyRef::kwarg("_sub_resource_label"))
        .property("_sub_resource_id", PropertyRef::kwarg("_sub_resource_id"))
        .module(module())
        .build()
        .unwrap()
}

// ============================================================================
// 1. Ingestion
// ============================================================================

#[test]
fn test_widget_ingestion_query() {
    let expected = "\
UNWIND $DictList AS item
MERGE (i:Widget {id: item.Id})
ON CREATE SET i.firstseen = timestamp()
SET i.lastupdated = $UPDATE_TAG, i._module_name = 'test', i._module_version = '1.0'
WITH i, item
CALL {
    WITH i, item
    OPTIONAL MATCH (j:Owner {id: $OwnerId})
    WITH i, item, j WHERE j IS NOT NULL
    MERGE (i)<-[r:RESOURCE]-(j)
    ON CREATE SET r.firstseen = timestamp()
    SET r.lastupdated = $UPDATE_TAG, r._module_name = 'test', r._module_version = '1.0'
}";
    assert_eq!(build_ingestion_query(&widget(), None).unwrap(), expected);
}

#[test]
fn test_ingestion_branches_are_unioned() {
    let schema = NodeSchema::builder("Widget")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .property("name", PropertyRef::record("Name"))
        .extra_label("Asset")
        .sub_resource(owner_rel())
        .other_relationship(tag_rel())
        .module(module())
        .build()
        .unwrap();

    let expected = "\
UNWIND $DictList AS item
MERGE (i:Widget {id: item.Id})
ON CREATE SET i.firstseen = timestamp()
SET i.lastupdated = $UPDATE_TAG, i.name = item.Name, i._module_name = 'test', i._module_version = '1.0', i:Asset
WITH i, item
CALL {
    WITH i, item
    OPTIONAL MATCH (j:Owner {id: $OwnerId})
    WITH i, item, j WHERE j IS NOT NULL
    MERGE (i)<-[r:RESOURCE]-(j)
    ON CREATE SET r.firstseen = timestamp()
    SET r.lastupdated = $UPDATE_TAG, r._module_name = 'test', r._module_version = '1.0'
    UNION
    WITH i, item
    OPTIONAL MATCH (n0:Tag)
    WHERE toLower(n0.name) = toLower(item.TagName)
    WITH i, item, n0 WHERE n0 IS NOT NULL
    MERGE (i)-[r0:TAGGED]->(n0)
    ON CREATE SET r0.firstseen = timestamp()
    SET r0.lastupdated = $UPDATE_TAG, r0._module_name = 'test', r0._module_version = '1.0'
}";
    assert_eq!(build_ingestion_query(&schema, None).unwrap(), expected);
}

#[test]
fn test_ingestion_empty_selection_is_node_only() {
    let query = build_ingestion_query(&widget(), Some(&[])).unwrap();
    assert!(!query.contains("CALL"));
    assert!(!query.contains("RESOURCE"));
    assert!(query.starts_with("UNWIND $DictList AS item\nMERGE (i:Widget {id: item.Id})"));
}

#[test]
fn test_ingestion_rejects_undeclared_relationship() {
    let err = build_ingestion_query(&widget(), Some(&[tag_rel()])).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
    assert!(err.to_string().contains("TAGGED"));
}

#[test]
fn test_ingestion_parameters() {
    let params: Vec<String> = ingestion_query(&widget(), None).unwrap().parameters().into_iter().collect();
    assert_eq!(params, vec!["DictList", "OwnerId", "UPDATE_TAG"]);
}

// ============================================================================
// 2. Cleanup decision table
// ============================================================================

#[test]
fn test_widget_cleanup_queries() {
    let queries = build_cleanup_queries(&widget(), false).unwrap();
    assert_eq!(
        queries,
        vec![
            "\
MATCH (n:Widget)<-[s:RESOURCE]-(:Owner {id: $OwnerId})
WHERE n.lastupdated <> $UPDATE_TAG
WITH n LIMIT $LIMIT_SIZE
DETACH DELETE n"
                .to_owned(),
            "\
MATCH (n:Widget)<-[s:RESOURCE]-(:Owner {id: $OwnerId})
WHERE s.lastupdated <> $UPDATE_TAG
WITH s LIMIT $LIMIT_SIZE
DELETE s"
                .to_owned(),
        ]
    );
}

#[test]
fn test_cascade_deletes_only_stale_children() {
    let queries = build_cleanup_queries(&widget(), true).unwrap();
    assert_eq!(
        queries[0],
        "\
MATCH (n:Widget)<-[s:RESOURCE]-(:Owner {id: $OwnerId})
WHERE n.lastupdated <> $UPDATE_TAG
WITH n LIMIT $LIMIT_SIZE
CALL {
    WITH n
    OPTIONAL MATCH (n)-[:RESOURCE]->(child)
    WITH child WHERE child IS NOT NULL AND child.lastupdated <> $UPDATE_TAG
    DETACH DELETE child
}
DETACH DELETE n"
    );
    // Edge query is unaffected by cascading.
    assert_eq!(queries[1], build_cleanup_queries(&widget(), false).unwrap()[1]);
}

#[test]
fn test_cascade_child_direction_follows_sub_resource() {
    let outward = RelSchema::builder("Project", "CONTAINS", LinkDirection::Outward)
        .target_matcher("id", PropertyRef::kwarg("ProjectId"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .build()
        .unwrap();
    let schema = NodeSchema::builder("Folder")
        .property("id", PropertyRef::record("id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .sub_resource(outward)
        .build()
        .unwrap();
    let queries = build_cleanup_queries(&schema, true).unwrap();
    assert!(queries[0].contains("MATCH (n:Folder)-[s:CONTAINS]->(:Project {id: $ProjectId})"));
    assert!(queries[0].contains("OPTIONAL MATCH (n)<-[:CONTAINS]-(child)"));
}

#[test]
fn test_scoped_cleanup_with_other_relationships() {
    let schema = NodeSchema::builder("Widget")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .sub_resource(owner_rel())
        .other_relationship(tag_rel())
        .build()
        .unwrap();
    let queries = build_cleanup_queries(&schema, false).unwrap();
    assert_eq!(queries.len(), 3);
    assert_eq!(
        queries[0],
        "\
MATCH (n:Widget)<-[s:RESOURCE]-(:Owner {id: $OwnerId})
MATCH (n)-[r:TAGGED]->(:Tag)
WHERE r.lastupdated <> $UPDATE_TAG
WITH r LIMIT $LIMIT_SIZE
DELETE r"
    );
    // Stale nodes are deleted exactly once, by the sub-resource pair that runs last.
    let node_deletes: Vec<&String> = queries.iter().filter(|q| q.ends_with("DETACH DELETE n")).collect();
    assert_eq!(node_deletes, vec![&queries[1]]);
    assert!(!queries[1].contains("TAGGED"));
    assert!(queries[2].ends_with("DELETE s"));
}

#[test]
fn test_sub_resource_requires_scoped_cleanup() {
    let schema = NodeSchema::builder("Widget")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .sub_resource(owner_rel())
        .scoped_cleanup(false)
        .build()
        .unwrap();
    let err = build_cleanup_queries(&schema, false).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
    assert!(err.to_string().contains("scoped_cleanup"));
}

#[test]
fn test_cascade_requires_scoped_cleanup() {
    let schema = NodeSchema::builder("Tag")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .scoped_cleanup(false)
        .build()
        .unwrap();
    assert!(matches!(build_cleanup_queries(&schema, true), Err(Error::Schema(_))));
}

#[test]
fn test_relationship_only_cleanup_never_deletes_nodes() {
    let schema = NodeSchema::builder("Person")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .other_relationship(tag_rel())
        .build()
        .unwrap();
    let queries = build_cleanup_queries(&schema, false).unwrap();
    assert_eq!(
        queries,
        vec![
            "\
MATCH (n:Person)-[r:TAGGED]->(:Tag)
WHERE r.lastupdated <> $UPDATE_TAG
WITH r LIMIT $LIMIT_SIZE
DELETE r"
                .to_owned()
        ]
    );
    assert!(queries.iter().all(|q| !q.contains("DELETE n")));
}

#[test]
fn test_unscoped_cleanup_deletes_every_stale_node() {
    let schema = NodeSchema::builder("Person")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .other_relationship(tag_rel())
        .scoped_cleanup(false)
        .build()
        .unwrap();
    let queries = build_cleanup_queries(&schema, false).unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(
        queries[0],
        "\
MATCH (n:Person)
WHERE n.lastupdated <> $UPDATE_TAG
WITH n LIMIT $LIMIT_SIZE
DETACH DELETE n"
    );
    assert!(queries[1].ends_with("DELETE r"));
}

#[test]
fn test_no_relationships_means_no_cleanup() {
    let schema = NodeSchema::builder("Loner")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .build()
        .unwrap();
    assert!(build_cleanup_queries(&schema, false).unwrap().is_empty());
}

#[test]
fn test_cleanup_scope_must_use_kwargs() {
    let by_record = RelSchema::builder("Owner", "RESOURCE", LinkDirection::Inward)
        .target_matcher("id", PropertyRef::record("OwnerId"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .build()
        .unwrap();
    let schema = NodeSchema::builder("Widget")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .sub_resource(by_record)
        .build()
        .unwrap();
    // Ingestion may read the owner id from the record ...
    assert!(build_ingestion_query(&schema, None).is_ok());
    // ... but cleanup has no record to read it from.
    assert!(matches!(build_cleanup_queries(&schema, false), Err(Error::Schema(_))));
}

#[test]
fn test_cleanup_ir_matches_rendered_text() {
    let ir = cleanup_queries(&widget(), true).unwrap();
    let text = build_cleanup_queries(&widget(), true).unwrap();
    assert_eq!(ir.iter().map(render).collect::<Vec<_>>(), text);
    for q in &ir {
        let params: Vec<String> = q.parameters().into_iter().collect();
        assert_eq!(params, vec!["LIMIT_SIZE", "OwnerId", "UPDATE_TAG"]);
    }
}

// ============================================================================
// 3. Matchlinks
// ============================================================================

#[test]
fn test_matchlink_query() {
    let expected = "\
UNWIND $DictList AS item
MATCH (from:Principal {id: item.PrincipalId})
MATCH (to:Bucket {id: item.BucketId})
MERGE (from)-[r:CAN_READ]->(to)
ON CREATE SET r.firstseen = timestamp()
SET r.lastupdated = $UPDATE_TAG, r._sub_resource_label = $_sub_resource_label, r._sub_resource_id = $_sub_resource_id, r._module_name = 'test', r._module_version = '1.0'";
    assert_eq!(build_matchlink_query(&can_read()).unwrap(), expected);
}

#[test]
fn test_matchlink_cleanup_query() {
    let expected = "\
MATCH (from:Principal)-[r:CAN_READ]->(to:Bucket)
WHERE r.lastupdated <> $UPDATE_TAG AND r._sub_resource_label = $_sub_resource_label AND r._sub_resource_id = $_sub_resource_id
WITH r LIMIT $LIMIT_SIZE
DELETE r";
    assert_eq!(build_cleanup_query_for_matchlink(&can_read()).unwrap(), expected);
}

#[test]
fn test_matchlink_requires_scope_properties() {
    let rel = RelSchema::builder("Bucket", "CAN_READ", LinkDirection::Outward)
        .source("Principal")
        .source_matcher("id", PropertyRef::record("PrincipalId"))
        .target_matcher("id", PropertyRef::record("BucketId"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .build()
        .unwrap();
    let err = build_matchlink_query(&rel).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
    assert!(err.to_string().contains("_sub_resource_label and _sub_resource_id"));
}

#[test]
fn test_matchlink_requires_source() {
    assert!(matches!(build_matchlink_query(&owner_rel()), Err(Error::Schema(_))));
    assert!(matches!(build_cleanup_query_for_matchlink(&owner_rel()), Err(Error::Schema(_))));
}

// ============================================================================
// 4. Indexes
// ============================================================================

#[test]
fn test_widget_indexes() {
    assert_eq!(
        build_create_index_queries(&widget()),
        vec![
            "CREATE INDEX IF NOT EXISTS FOR (n:Widget) ON (n.id)",
            "CREATE INDEX IF NOT EXISTS FOR (n:Widget) ON (n.lastupdated)",
            "CREATE INDEX IF NOT EXISTS FOR (n:Owner) ON (n.id)",
        ]
    );
}

#[test]
fn test_indexes_cover_extra_labels_and_flags_once() {
    let schema = NodeSchema::builder("Widget")
        .property("id", PropertyRef::record("Id"))
        .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
        .property("arn", PropertyRef::record("Arn").extra_index())
        .extra_label("Asset")
        .sub_resource(owner_rel())
        .other_relationship(tag_rel())
        .other_relationship(
            RelSchema::builder("Owner", "MANAGED_BY", LinkDirection::Outward)
                .target_matcher("id", PropertyRef::record("ManagerId"))
                .property("lastupdated", PropertyRef::kwarg("UPDATE_TAG"))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    assert_eq!(
        build_create_index_queries(&schema),
        vec![
            "CREATE INDEX IF NOT EXISTS FOR (n:Widget) ON (n.id)",
            "CREATE INDEX IF NOT EXISTS FOR (n:Widget) ON (n.lastupdated)",
            "CREATE INDEX IF NOT EXISTS FOR (n:Asset) ON (n.id)",
            "CREATE INDEX IF NOT EXISTS FOR (n:Widget) ON (n.arn)",
            "CREATE INDEX IF NOT EXISTS FOR (n:Owner) ON (n.id)",
            "CREATE INDEX IF NOT EXISTS FOR (n:Tag) ON (n.name)",
        ]
    );
}

#[test]
fn test_matchlink_indexes() {
    assert_eq!(
        build_create_index_queries_for_matchlink(&can_read()).unwrap(),
        vec![
            "CREATE INDEX IF NOT EXISTS FOR (n:Principal) ON (n.id)",
            "CREATE INDEX IF NOT EXISTS FOR (n:Bucket) ON (n.id)",
            "CREATE INDEX IF NOT EXISTS FOR ()-[r:CAN_READ]-() ON (r.lastupdated, r._sub_resource_label, r._sub_resource_id)",
        ]
    );
}
