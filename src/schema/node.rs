//! Node schemas.

use super::property_ref::{PropertyRef, RefMap, validate_identifier};
use super::relationship::RelSchema;
use super::ModuleInfo;
use crate::{Error, Result};

/// Declarative description of one node type: its label, property mapping,
/// owner ("sub-resource") edge, other edges, and cleanup scoping.
///
/// The sub-resource / `scoped_cleanup` combination is not checked here; the
/// cleanup compiler rejects inconsistent combinations when it runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeSchema {
    label: String,
    id: PropertyRef,
    properties: RefMap,
    extra_node_labels: Vec<String>,
    sub_resource_relationship: Option<RelSchema>,
    other_relationships: Vec<RelSchema>,
    scoped_cleanup: bool,
    module: ModuleInfo,
}

impl NodeSchema {
    pub fn builder(label: impl Into<String>) -> NodeSchemaBuilder {
        NodeSchemaBuilder {
            label: label.into(),
            properties: RefMap::new(),
            extra_node_labels: Vec::new(),
            sub_resource_relationship: None,
            other_relationships: Vec::new(),
            scoped_cleanup: true,
            module: ModuleInfo::default(),
        }
    }

    pub fn label(&self) -> &str { &self.label }
    pub fn properties(&self) -> &RefMap { &self.properties }
    pub fn extra_node_labels(&self) -> &[String] { &self.extra_node_labels }
    pub fn sub_resource_relationship(&self) -> Option<&RelSchema> { self.sub_resource_relationship.as_ref() }
    pub fn other_relationships(&self) -> &[RelSchema] { &self.other_relationships }
    pub fn scoped_cleanup(&self) -> bool { self.scoped_cleanup }
    pub fn module(&self) -> &ModuleInfo { &self.module }

    /// The `id` property ref the ingestion MERGE keys on.
    pub fn id_ref(&self) -> &PropertyRef { &self.id }

    /// Sub-resource first, then other relationships in declaration order.
    pub fn all_relationships(&self) -> impl Iterator<Item = &RelSchema> {
        self.sub_resource_relationship.iter().chain(self.other_relationships.iter())
    }

    /// True when the schema declares `rel` (as sub-resource or other).
    pub fn declares(&self, rel: &RelSchema) -> bool {
        self.all_relationships().any(|r| r == rel)
    }

    /// Nodes with no relationships at all are never cleaned up automatically.
    pub fn is_cleanup_exempt(&self) -> bool {
        self.sub_resource_relationship.is_none() && self.other_relationships.is_empty()
    }
}

/// Builder for [`NodeSchema`].
#[derive(Debug, Clone)]
pub struct NodeSchemaBuilder {
    label: String,
    properties: RefMap,
    extra_node_labels: Vec<String>,
    sub_resource_relationship: Option<RelSchema>,
    other_relationships: Vec<RelSchema>,
    scoped_cleanup: bool,
    module: ModuleInfo,
}

impl NodeSchemaBuilder {
    pub fn property(mut self, key: impl Into<String>, value: PropertyRef) -> Self {
        self.properties.insert(key, value);
        self
    }

    pub fn extra_label(mut self, label: impl Into<String>) -> Self {
        self.extra_node_labels.push(label.into());
        self
    }

    pub fn sub_resource(mut self, rel: RelSchema) -> Self {
        self.sub_resource_relationship = Some(rel);
        self
    }

    pub fn other_relationship(mut self, rel: RelSchema) -> Self {
        self.other_relationships.push(rel);
        self
    }

    /// Defaults to `true`.
    pub fn scoped_cleanup(mut self, scoped: bool) -> Self {
        self.scoped_cleanup = scoped;
        self
    }

    pub fn module(mut self, module: ModuleInfo) -> Self {
        self.module = module;
        self
    }

    pub fn build(self) -> Result<NodeSchema> {
        let owner = format!("NodeSchema {}", self.label);
        validate_identifier(&owner, &self.label)?;
        for label in &self.extra_node_labels {
            validate_identifier(&owner, label)?;
        }
        self.properties.validate(&owner)?;
        let id = self
            .properties
            .get("id")
            .cloned()
            .ok_or_else(|| Error::Schema(format!("{owner}: properties must include 'id'")))?;
        if !self.properties.contains_key("lastupdated") {
            return Err(Error::Schema(format!("{owner}: properties must include 'lastupdated'")));
        }
        for reserved in ["firstseen", "_module_name", "_module_version"] {
            if self.properties.contains_key(reserved) {
                return Err(Error::Schema(format!("{owner}: '{reserved}' is stamped automatically")));
            }
        }

        Ok(NodeSchema {
            label: self.label,
            id,
            properties: self.properties,
            extra_node_labels: self.extra_node_labels,
            sub_resource_relationship: self.sub_resource_relationship,
            other_relationships: self.other_relationships,
            scoped_cleanup: self.scoped_cleanup,
            module: self.module,
        })
    }
}
