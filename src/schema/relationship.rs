//! Relationship schemas.

use super::property_ref::{PropertyRef, RefMap, validate_identifier};
use super::ModuleInfo;
use crate::{Error, Result};

/// Direction of a relationship relative to the node being ingested
/// (or, for matchlinks, relative to the source node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkDirection {
    /// `(i)<-[r]-(target)`
    Inward,
    /// `(i)-[r]->(target)`
    Outward,
}

impl LinkDirection {
    pub fn reversed(self) -> Self {
        match self {
            LinkDirection::Inward => LinkDirection::Outward,
            LinkDirection::Outward => LinkDirection::Inward,
        }
    }
}

/// Declarative description of one relationship type out of a node.
///
/// Built with [`RelSchema::builder`]; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelSchema {
    target_node_label: String,
    target_node_matcher: RefMap,
    direction: LinkDirection,
    rel_label: String,
    properties: RefMap,
    source_node_label: Option<String>,
    source_node_matcher: Option<RefMap>,
    module: ModuleInfo,
}

impl RelSchema {
    pub fn builder(
        target_node_label: impl Into<String>,
        rel_label: impl Into<String>,
        direction: LinkDirection,
    ) -> RelSchemaBuilder {
        RelSchemaBuilder {
            target_node_label: target_node_label.into(),
            target_node_matcher: RefMap::new(),
            direction,
            rel_label: rel_label.into(),
            properties: RefMap::new(),
            source_node_label: None,
            source_node_matcher: None,
            module: ModuleInfo::default(),
        }
    }

    pub fn target_node_label(&self) -> &str { &self.target_node_label }
    pub fn target_node_matcher(&self) -> &RefMap { &self.target_node_matcher }
    pub fn direction(&self) -> LinkDirection { self.direction }
    pub fn rel_label(&self) -> &str { &self.rel_label }
    pub fn properties(&self) -> &RefMap { &self.properties }
    pub fn source_node_label(&self) -> Option<&str> { self.source_node_label.as_deref() }
    pub fn source_node_matcher(&self) -> Option<&RefMap> { self.source_node_matcher.as_ref() }
    pub fn module(&self) -> &ModuleInfo { &self.module }

    /// Short human-readable identity used in error messages and job names.
    pub fn describe(&self) -> String {
        match &self.source_node_label {
            Some(src) => format!("({src})-[:{}]-({})", self.rel_label, self.target_node_label),
            None => format!("[:{}]-({})", self.rel_label, self.target_node_label),
        }
    }
}

/// Builder for [`RelSchema`].
#[derive(Debug, Clone)]
pub struct RelSchemaBuilder {
    target_node_label: String,
    target_node_matcher: RefMap,
    direction: LinkDirection,
    rel_label: String,
    properties: RefMap,
    source_node_label: Option<String>,
    source_node_matcher: Option<RefMap>,
    module: ModuleInfo,
}

impl RelSchemaBuilder {
    /// Add a target matcher field: target property `key` must match `value`.
    pub fn target_matcher(mut self, key: impl Into<String>, value: PropertyRef) -> Self {
        self.target_node_matcher.insert(key, value);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: PropertyRef) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Make this a matchlink: the source node is looked up rather than
    /// being the record under ingestion.
    pub fn source(mut self, label: impl Into<String>) -> Self {
        self.source_node_label = Some(label.into());
        self
    }

    pub fn source_matcher(mut self, key: impl Into<String>, value: PropertyRef) -> Self {
        self.source_node_matcher.get_or_insert_with(RefMap::new).insert(key, value);
        self
    }

    pub fn module(mut self, module: ModuleInfo) -> Self {
        self.module = module;
        self
    }

    pub fn build(self) -> Result<RelSchema> {
        let owner = format!("RelSchema [:{}]", self.rel_label);
        validate_identifier(&owner, &self.rel_label)?;
        validate_identifier(&owner, &self.target_node_label)?;
        if self.target_node_matcher.is_empty() {
            return Err(Error::Schema(format!("{owner}: target node matcher is empty")));
        }
        self.target_node_matcher.validate(&owner)?;
        self.properties.validate(&owner)?;
        if !self.properties.contains_key("lastupdated") {
            return Err(Error::Schema(format!("{owner}: properties must include 'lastupdated'")));
        }
        match (&self.source_node_label, &self.source_node_matcher) {
            (None, None) => {}
            (Some(label), Some(matcher)) if !matcher.is_empty() => {
                validate_identifier(&owner, label)?;
                matcher.validate(&owner)?;
            }
            _ => {
                return Err(Error::Schema(format!(
                    "{owner}: source node label and source node matcher must be set together"
                )));
            }
        }

        Ok(RelSchema {
            target_node_label: self.target_node_label,
            target_node_matcher: self.target_node_matcher,
            direction: self.direction,
            rel_label: self.rel_label,
            properties: self.properties,
            source_node_label: self.source_node_label,
            source_node_matcher: self.source_node_matcher,
            module: self.module,
        })
    }
}
