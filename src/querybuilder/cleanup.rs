//! Cleanup query compiler.
//!
//! Every query deletes entities whose `lastupdated` differs from
//! `$UPDATE_TAG`, at most `$LIMIT_SIZE` per execution, so jobs can run them
//! iteratively until nothing is left to delete.
//!
//! | sub-resource | scoped_cleanup | queries                                           |
//! |--------------|----------------|---------------------------------------------------|
//! | yes          | true           | stale edges per relationship, then stale nodes    |
//! | yes          | false          | schema error                                      |
//! | no           | true           | stale edges only, nodes are never deleted         |
//! | no           | false          | all stale nodes of the label, then stale edges    |

use tracing::debug;

use super::matcher::{TargetMatch, rel_pattern, require_kwargs_only};
use super::matchlink::validate_matchlink;
use super::{LIMIT_SIZE, SUB_RESOURCE_ID, SUB_RESOURCE_LABEL, UPDATE_TAG};
use crate::cypher::ast::*;
use crate::cypher::render;
use crate::schema::{LinkDirection, NodeSchema, RelSchema};
use crate::{Error, Result};

/// Compile the cleanup queries for `schema`, in execution order.
///
/// With `cascade_delete`, deleting a stale node also deletes its stale
/// children: nodes reached through the sub-resource relationship type in the
/// opposite direction from the node's own sub-resource edge. Children that
/// carry the current update tag survive. The direction is a convention
/// (owners point the same way at every level of the hierarchy); schemas that
/// model ownership differently must not enable cascading.
pub fn cleanup_queries(schema: &NodeSchema, cascade_delete: bool) -> Result<Vec<Query>> {
    let label = schema.label();
    if cascade_delete && !schema.scoped_cleanup() {
        return Err(Error::Schema(format!(
            "NodeSchema {label}: cascade_delete requires scoped_cleanup; unscoped cleanup has no parent/child ownership"
        )));
    }
    if schema.sub_resource_relationship().is_some() && !schema.scoped_cleanup() {
        return Err(Error::Schema(format!(
            "NodeSchema {label}: a sub-resource relationship is set but scoped_cleanup is false; \
             set scoped_cleanup to true or remove the sub-resource relationship"
        )));
    }
    if schema.is_cleanup_exempt() {
        debug!(label, "no relationships declared, skipping cleanup");
        return Ok(Vec::new());
    }

    let queries = match schema.sub_resource_relationship() {
        None if !schema.scoped_cleanup() => unscoped(schema),
        None => schema.other_relationships().iter().map(|rel| unscoped_rel_query(schema, rel)).collect(),
        Some(sub) => scoped(schema, sub, cascade_delete)?,
    };
    debug!(label, count = queries.len(), cascade_delete, "compiled cleanup queries");
    Ok(queries)
}

/// Rendered form of [`cleanup_queries`].
pub fn build_cleanup_queries(schema: &NodeSchema, cascade_delete: bool) -> Result<Vec<String>> {
    Ok(cleanup_queries(schema, cascade_delete)?.iter().map(render).collect())
}

/// Compile the single cleanup query for a matchlink relationship, scoped by
/// the `_sub_resource_label` / `_sub_resource_id` stamped on each edge.
pub fn matchlink_cleanup_query(rel: &RelSchema) -> Result<Query> {
    let (source_label, _) = validate_matchlink(rel)?;
    let pattern = Pattern::node(NodePattern::new(Some("from"), Some(source_label)))
        .link(rel_pattern(Some("r"), rel.rel_label(), rel.direction()), NodePattern::new(Some("to"), Some(rel.target_node_label())));
    let where_clause = Expr::all([
        stale("r"),
        Expr::equals(Expr::prop("r", SUB_RESOURCE_LABEL), Expr::param(SUB_RESOURCE_LABEL)),
        Expr::equals(Expr::prop("r", SUB_RESOURCE_ID), Expr::param(SUB_RESOURCE_ID)),
    ]);
    Ok(Query {
        clauses: vec![
            Clause::Match(MatchClause { optional: false, patterns: vec![pattern], where_clause }),
            limited("r"),
            delete("r", false),
        ],
    })
}

/// Rendered form of [`matchlink_cleanup_query`].
pub fn build_cleanup_query_for_matchlink(rel: &RelSchema) -> Result<String> {
    matchlink_cleanup_query(rel).map(|q| render(&q))
}

// ============================================================================
// Scoped: node has a sub-resource
// ============================================================================

fn scoped(schema: &NodeSchema, sub: &RelSchema, cascade_delete: bool) -> Result<Vec<Query>> {
    let owner = format!("NodeSchema {} sub-resource {}", schema.label(), sub.describe());
    require_kwargs_only(&owner, sub.target_node_matcher())?;
    let scope = TargetMatch::new("owner", sub.target_node_label(), sub.target_node_matcher(), false)?;

    // Stale nodes are deleted once, through the sub-resource edge; other
    // relationships only need their stale edges removed.
    let mut queries: Vec<Query> =
        schema.other_relationships().iter().map(|rel| scoped_rel_query(schema, sub, &scope, Some(rel))).collect();
    queries.push(scoped_node_query(schema, sub, &scope, cascade_delete));
    queries.push(scoped_rel_query(schema, sub, &scope, None));
    Ok(queries)
}

/// `MATCH (n:Label)<-[s:REL]-(:Owner {...})`
fn scope_pattern(schema: &NodeSchema, sub: &RelSchema, scope: &TargetMatch) -> Pattern {
    Pattern::node(NodePattern::new(Some("n"), Some(schema.label())))
        .link(rel_pattern(Some("s"), sub.rel_label(), sub.direction()), scope.node.clone())
}

/// MATCH clauses shared by the node and edge queries. `selected = None`
/// means the sub-resource relationship itself.
fn scoped_matches(
    schema: &NodeSchema,
    sub: &RelSchema,
    scope: &TargetMatch,
    selected: Option<&RelSchema>,
    staleness: Expr,
) -> Vec<Clause> {
    let base = scope_pattern(schema, sub, scope);
    match selected {
        None => vec![Clause::Match(MatchClause {
            optional: false,
            patterns: vec![base],
            where_clause: scope.where_with([staleness]),
        })],
        Some(rel) => vec![
            Clause::Match(MatchClause { optional: false, patterns: vec![base], where_clause: scope.where_with(None) }),
            Clause::Match(MatchClause {
                optional: false,
                patterns: vec![selected_rel_pattern(rel)],
                where_clause: Some(staleness),
            }),
        ],
    }
}

fn scoped_node_query(schema: &NodeSchema, sub: &RelSchema, scope: &TargetMatch, cascade_delete: bool) -> Query {
    let mut clauses = scoped_matches(schema, sub, scope, None, stale("n"));
    clauses.push(limited("n"));
    if cascade_delete {
        clauses.push(Clause::Call(vec![delete_stale_children(sub)]));
    }
    clauses.push(delete("n", true));
    Query { clauses }
}

fn scoped_rel_query(schema: &NodeSchema, sub: &RelSchema, scope: &TargetMatch, selected: Option<&RelSchema>) -> Query {
    let rel_var = if selected.is_some() { "r" } else { "s" };
    let mut clauses = scoped_matches(schema, sub, scope, selected, stale(rel_var));
    clauses.push(limited(rel_var));
    clauses.push(delete(rel_var, false));
    Query { clauses }
}

/// Unit subquery: an empty child set leaves the parent row in place.
///
/// ```text
/// WITH n
/// OPTIONAL MATCH (n)-[:REL]->(child)
/// WITH child WHERE child IS NOT NULL AND child.lastupdated <> $UPDATE_TAG
/// DETACH DELETE child
/// ```
fn delete_stale_children(sub: &RelSchema) -> Query {
    let child_direction: LinkDirection = sub.direction().reversed();
    let pattern = Pattern::node(NodePattern::new(Some("n"), None))
        .link(rel_pattern(None, sub.rel_label(), child_direction), NodePattern::new(Some("child"), None));
    let keep = Expr::all([Expr::is_not_null(Expr::var("child")), stale("child")]);
    Query {
        clauses: vec![
            Clause::With(WithClause::new(["n"])),
            Clause::Match(MatchClause { optional: true, patterns: vec![pattern], where_clause: None }),
            Clause::With(WithClause { items: vec!["child".to_owned()], where_clause: keep, limit: None }),
            delete("child", true),
        ],
    }
}

// ============================================================================
// No sub-resource
// ============================================================================

fn unscoped(schema: &NodeSchema) -> Vec<Query> {
    let node_query = Query {
        clauses: vec![
            Clause::Match(MatchClause {
                optional: false,
                patterns: vec![Pattern::node(NodePattern::new(Some("n"), Some(schema.label())))],
                where_clause: Some(stale("n")),
            }),
            limited("n"),
            delete("n", true),
        ],
    };
    std::iter::once(node_query)
        .chain(schema.other_relationships().iter().map(|rel| unscoped_rel_query(schema, rel)))
        .collect()
}

/// `MATCH (n:Label)-[r:REL]->(:Target) WHERE r.lastupdated <> $UPDATE_TAG ...`
fn unscoped_rel_query(schema: &NodeSchema, rel: &RelSchema) -> Query {
    let pattern = Pattern::node(NodePattern::new(Some("n"), Some(schema.label())))
        .link(rel_pattern(Some("r"), rel.rel_label(), rel.direction()), NodePattern::new(None, Some(rel.target_node_label())));
    Query {
        clauses: vec![
            Clause::Match(MatchClause { optional: false, patterns: vec![pattern], where_clause: Some(stale("r")) }),
            limited("r"),
            delete("r", false),
        ],
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `(n)-[r:REL]->(:Target)`
fn selected_rel_pattern(rel: &RelSchema) -> Pattern {
    Pattern::node(NodePattern::new(Some("n"), None))
        .link(rel_pattern(Some("r"), rel.rel_label(), rel.direction()), NodePattern::new(None, Some(rel.target_node_label())))
}

/// `var.lastupdated <> $UPDATE_TAG`
fn stale(var: &str) -> Expr {
    Expr::not_equals(Expr::prop(var, "lastupdated"), Expr::param(UPDATE_TAG))
}

/// `WITH var LIMIT $LIMIT_SIZE`
fn limited(var: &str) -> Clause {
    Clause::With(WithClause::new([var]).limit(Expr::param(LIMIT_SIZE)))
}

fn delete(var: &str, detach: bool) -> Clause {
    Clause::Delete { variables: vec![var.to_owned()], detach }
}
