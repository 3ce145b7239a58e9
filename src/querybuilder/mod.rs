//! # Query Compiler
//!
//! Pure translation from [`NodeSchema`](crate::schema::NodeSchema) /
//! [`RelSchema`](crate::schema::RelSchema) to parameterized Cypher. Nothing
//! here touches the store; the same schema always compiles to the same text.
//!
//! Each compiler has an IR form (`*_query` / `*_queries`, returning
//! [`crate::cypher::Query`]) and a rendered form (`build_*`).

pub mod cleanup;
pub mod ingest;
pub mod matchlink;
mod matcher;

pub use cleanup::{build_cleanup_queries, build_cleanup_query_for_matchlink, cleanup_queries, matchlink_cleanup_query};
pub use ingest::{build_ingestion_query, ingestion_query};
pub use matchlink::{build_matchlink_query, matchlink_query};

/// Parameter holding the list of records for one load call.
pub const DICT_LIST: &str = "DictList";

/// Parameter every cleanup predicate compares `lastupdated` against.
pub const UPDATE_TAG: &str = "UPDATE_TAG";

/// Row bound for one cleanup execution. Injected by the job layer.
pub const LIMIT_SIZE: &str = "LIMIT_SIZE";

/// Matchlink scope: label of the owning node the edges were loaded for.
pub const SUB_RESOURCE_LABEL: &str = "_sub_resource_label";

/// Matchlink scope: id of the owning node the edges were loaded for.
pub const SUB_RESOURCE_ID: &str = "_sub_resource_id";
