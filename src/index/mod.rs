//! Index management.
//!
//! Every statement produced here uses the idempotent
//! `CREATE INDEX IF NOT EXISTS` form; [`check_idempotent`] is applied before
//! anything is sent to the store.

use crate::cypher::ast::{Clause, IndexTarget, Query, SchemaCommand};
use crate::cypher::render;
use crate::querybuilder::matchlink::validate_matchlink;
use crate::querybuilder::{SUB_RESOURCE_ID, SUB_RESOURCE_LABEL};
use crate::schema::{NodeSchema, RelSchema};
use crate::{Error, Result};

/// Prefix every index statement must start with.
pub const IDEMPOTENT_INDEX_PREFIX: &str = "CREATE INDEX IF NOT EXISTS";

/// Index targets for a node schema, de-duplicated in first-seen order:
/// `id` and `lastupdated` on the label, `id` on each extra label, every
/// `extra_index` property, and every field a relationship matches its target
/// on.
pub fn index_targets(schema: &NodeSchema) -> Vec<IndexTarget> {
    let mut targets = Targets::default();
    targets.node(schema.label(), "id");
    targets.node(schema.label(), "lastupdated");
    for label in schema.extra_node_labels() {
        targets.node(label, "id");
    }
    for (key, prop) in schema.properties().iter() {
        if prop.wants_extra_index() {
            targets.node(schema.label(), key);
        }
    }
    for rel in schema.all_relationships() {
        for key in rel.target_node_matcher().keys() {
            targets.node(rel.target_node_label(), key);
        }
    }
    targets.0
}

/// Index targets for a matchlink: every source and target matcher field,
/// plus a composite relationship index over the cleanup predicate fields.
pub fn matchlink_index_targets(rel: &RelSchema) -> Result<Vec<IndexTarget>> {
    let (source_label, source_matcher) = validate_matchlink(rel)?;
    let mut targets = Targets::default();
    for key in source_matcher.keys() {
        targets.node(source_label, key);
    }
    for key in rel.target_node_matcher().keys() {
        targets.node(rel.target_node_label(), key);
    }
    targets.push(IndexTarget::Relationship {
        rel_type: rel.rel_label().to_owned(),
        properties: vec!["lastupdated".to_owned(), SUB_RESOURCE_LABEL.to_owned(), SUB_RESOURCE_ID.to_owned()],
    });
    Ok(targets.0)
}

/// Rendered `CREATE INDEX IF NOT EXISTS` statements for a node schema.
pub fn build_create_index_queries(schema: &NodeSchema) -> Vec<String> {
    index_targets(schema).into_iter().map(render_index).collect()
}

/// Rendered `CREATE INDEX IF NOT EXISTS` statements for a matchlink.
pub fn build_create_index_queries_for_matchlink(rel: &RelSchema) -> Result<Vec<String>> {
    Ok(matchlink_index_targets(rel)?.into_iter().map(render_index).collect())
}

/// Refuse anything that is not an idempotent index creation.
pub fn check_idempotent(query: &str) -> Result<()> {
    if query.starts_with(IDEMPOTENT_INDEX_PREFIX) {
        Ok(())
    } else {
        Err(Error::NonIdempotentIndex(query.to_owned()))
    }
}

fn render_index(target: IndexTarget) -> String {
    render(&Query { clauses: vec![Clause::Schema(SchemaCommand::CreateIndex(target))] })
}

#[derive(Default)]
struct Targets(Vec<IndexTarget>);

impl Targets {
    fn node(&mut self, label: &str, property: &str) {
        self.push(IndexTarget::Node { label: label.to_owned(), properties: vec![property.to_owned()] });
    }

    fn push(&mut self, target: IndexTarget) {
        if !self.0.contains(&target) {
            self.0.push(target);
        }
    }
}
