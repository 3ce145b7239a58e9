//! Ingestion query compiler.
//!
//! ```text
//! UNWIND $DictList AS item
//! MERGE (i:Label {id: ...})            upsert keyed by id
//! ON CREATE SET i.firstseen = ...      only on creation
//! SET i.... , provenance, extra labels every write
//! WITH i, item
//! CALL { branch UNION branch ... }     one optional branch per relationship
//! ```

use tracing::debug;

use super::matcher::{ITEM, TargetMatch, firstseen, property_set_items, rel_pattern, value_expr};
use super::DICT_LIST;
use crate::cypher::ast::*;
use crate::cypher::render;
use crate::schema::{NodeSchema, RelSchema};
use crate::{Error, Result};

const NODE: &str = "i";

/// Compile the ingestion query for `schema`.
///
/// `selected_relationships`: `None` attaches every declared relationship;
/// `Some(&[])` produces a node-only query. Selecting a relationship the
/// schema does not declare is a schema error.
pub fn ingestion_query(schema: &NodeSchema, selected_relationships: Option<&[RelSchema]>) -> Result<Query> {
    let rels = select_relationships(schema, selected_relationships)?;

    let mut clauses = vec![
        Clause::Unwind { expr: Expr::param(DICT_LIST), alias: ITEM.to_owned() },
        Clause::Merge(MergeClause {
            pattern: Pattern::node(
                NodePattern::new(Some(NODE), Some(schema.label())).with_property("id", value_expr(schema.id_ref())),
            ),
            on_create: vec![firstseen(NODE)],
        }),
    ];

    let mut set_items = property_set_items(NODE, schema.properties(), &["id"], schema.module());
    if !schema.extra_node_labels().is_empty() {
        set_items.push(SetItem::Labels { variable: NODE.to_owned(), labels: schema.extra_node_labels().to_vec() });
    }
    clauses.push(Clause::Set(set_items));

    if !rels.is_empty() {
        let mut branches = Vec::with_capacity(rels.len());
        let mut other_num = 0;
        for (rel, is_sub_resource) in &rels {
            let (node_var, rel_var) = if *is_sub_resource {
                ("j".to_owned(), "r".to_owned())
            } else {
                other_num += 1;
                (format!("n{}", other_num - 1), format!("r{}", other_num - 1))
            };
            branches.push(attach_branch(rel, &node_var, &rel_var)?);
        }
        clauses.push(Clause::With(WithClause::new([NODE, ITEM])));
        clauses.push(Clause::Call(branches));
    }

    debug!(label = schema.label(), relationships = rels.len(), "compiled ingestion query");
    Ok(Query { clauses })
}

/// Rendered form of [`ingestion_query`].
pub fn build_ingestion_query(schema: &NodeSchema, selected_relationships: Option<&[RelSchema]>) -> Result<String> {
    ingestion_query(schema, selected_relationships).map(|q| render(&q))
}

/// The relationships to attach, in schema order, flagged when they are the
/// sub-resource relationship.
fn select_relationships<'s>(
    schema: &'s NodeSchema,
    selected: Option<&[RelSchema]>,
) -> Result<Vec<(&'s RelSchema, bool)>> {
    if let Some(selected) = selected {
        if let Some(unknown) = selected.iter().find(|rel| !schema.declares(rel)) {
            return Err(Error::Schema(format!(
                "NodeSchema {}: relationship {} is not declared on this schema",
                schema.label(),
                unknown.describe()
            )));
        }
    }
    let wanted = |rel: &RelSchema| selected.is_none_or(|sel| sel.contains(rel));

    let mut rels = Vec::new();
    if let Some(sub) = schema.sub_resource_relationship().filter(|r| wanted(*r)) {
        rels.push((sub, true));
    }
    rels.extend(schema.other_relationships().iter().filter(|r| wanted(*r)).map(|r| (r, false)));
    Ok(rels)
}

/// One optional attachment: find the target, skip the row if it is absent,
/// otherwise upsert the edge.
fn attach_branch(rel: &RelSchema, node_var: &str, rel_var: &str) -> Result<Query> {
    let target = TargetMatch::new(node_var, rel.target_node_label(), rel.target_node_matcher(), true)?;
    let where_clause = target.where_with(None);

    let merge_pattern = Pattern::node(NodePattern::new(Some(NODE), None))
        .link(rel_pattern(Some(rel_var), rel.rel_label(), rel.direction()), NodePattern::new(Some(node_var), None));

    Ok(Query {
        clauses: vec![
            Clause::With(WithClause::new([NODE, ITEM])),
            Clause::Match(MatchClause { optional: true, patterns: vec![Pattern::node(target.node)], where_clause }),
            Clause::With(WithClause::new([NODE, ITEM, node_var]).filter(Expr::is_not_null(Expr::var(node_var)))),
            Clause::Merge(MergeClause { pattern: merge_pattern, on_create: vec![firstseen(rel_var)] }),
            Clause::Set(property_set_items(rel_var, rel.properties(), &[], rel.module())),
        ],
    })
}
