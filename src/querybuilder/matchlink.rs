//! Matchlink query compiler: relationships between two nodes that already
//! exist in the graph.

use super::matcher::{ITEM, TargetMatch, firstseen, property_set_items, rel_pattern};
use super::{DICT_LIST, SUB_RESOURCE_ID, SUB_RESOURCE_LABEL};
use crate::cypher::ast::*;
use crate::cypher::render;
use crate::schema::{RefMap, RelSchema};
use crate::{Error, Result};

/// A matchlink has no owning node to inherit cleanup scope from, so the
/// relationship itself must carry the scope fields, and both ends must be
/// matchable.
pub(crate) fn validate_matchlink(rel: &RelSchema) -> Result<(&str, &RefMap)> {
    let (Some(source_label), Some(source_matcher)) = (rel.source_node_label(), rel.source_node_matcher()) else {
        return Err(Error::Schema(format!(
            "matchlink {}: source node label and source node matcher are required",
            rel.describe()
        )));
    };
    let missing: Vec<&str> = [SUB_RESOURCE_LABEL, SUB_RESOURCE_ID]
        .into_iter()
        .filter(|key| !rel.properties().contains_key(key))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Schema(format!(
            "matchlink {}: relationship properties must include {}",
            rel.describe(),
            missing.join(" and ")
        )));
    }
    Ok((source_label, source_matcher))
}

/// Compile the matchlink upsert for `rel`.
///
/// ```text
/// UNWIND $DictList AS item
/// MATCH (from:Source {...})
/// MATCH (to:Target {...})
/// MERGE (from)-[r:REL]->(to)
/// ON CREATE SET r.firstseen = timestamp()
/// SET r.lastupdated = ..., r._sub_resource_label = ..., r._sub_resource_id = ..., ...
/// ```
pub fn matchlink_query(rel: &RelSchema) -> Result<Query> {
    let (source_label, source_matcher) = validate_matchlink(rel)?;
    let source = TargetMatch::new("from", source_label, source_matcher, true)?;
    let target = TargetMatch::new("to", rel.target_node_label(), rel.target_node_matcher(), true)?;
    let source_where = source.where_with(None);
    let target_where = target.where_with(None);

    let merge_pattern = Pattern::node(NodePattern::new(Some("from"), None))
        .link(rel_pattern(Some("r"), rel.rel_label(), rel.direction()), NodePattern::new(Some("to"), None));

    Ok(Query {
        clauses: vec![
            Clause::Unwind { expr: Expr::param(DICT_LIST), alias: ITEM.to_owned() },
            Clause::Match(MatchClause { optional: false, patterns: vec![Pattern::node(source.node)], where_clause: source_where }),
            Clause::Match(MatchClause { optional: false, patterns: vec![Pattern::node(target.node)], where_clause: target_where }),
            Clause::Merge(MergeClause { pattern: merge_pattern, on_create: vec![firstseen("r")] }),
            Clause::Set(property_set_items("r", rel.properties(), &[], rel.module())),
        ],
    })
}

/// Rendered form of [`matchlink_query`].
pub fn build_matchlink_query(rel: &RelSchema) -> Result<String> {
    matchlink_query(rel).map(|q| render(&q))
}
