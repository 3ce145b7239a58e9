//! Module sync bookkeeping.
//!
//! After an intel module finishes syncing one kind of resource for one
//! owner, it records that fact as a `ModuleSyncMetadata` node so later
//! analysis can tell which data is current.

use crate::cypher::ast::{Clause, Expr, MergeClause, NodePattern, Pattern, Query, SetItem};
use crate::cypher::render;
use crate::model::{property_map, UpdateTag, Value};
use crate::querybuilder::UPDATE_TAG;
use crate::storage::GraphStore;
use crate::{Result, Session};

fn set(key: &str, value: Expr) -> SetItem {
    SetItem::Property { variable: "n".to_owned(), key: key.to_owned(), value }
}

/// Upsert query for a sync metadata node keyed by `$id`.
pub fn sync_metadata_query() -> Query {
    Query {
        clauses: vec![
            Clause::Merge(MergeClause {
                pattern: Pattern::node(NodePattern::new(Some("n"), Some("ModuleSyncMetadata")).with_property("id", Expr::param("id"))),
                on_create: vec![
                    SetItem::Labels { variable: "n".to_owned(), labels: vec!["SyncMetadata".to_owned()] },
                    set("firstseen", Expr::call("timestamp", Vec::new())),
                ],
            }),
            Clause::Set(vec![
                set("syncedtype", Expr::param("syncedtype")),
                set("grouptype", Expr::param("grouptype")),
                set("groupid", Expr::param("groupid")),
                set("lastupdated", Expr::param(UPDATE_TAG)),
            ]),
        ],
    }
}

/// Id of the metadata node: `<group_type>_<group_id>_<synced_type>`.
pub fn sync_metadata_id(group_type: &str, group_id: &Value, synced_type: &str) -> String {
    let group = match group_id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("{group_type}_{group}_{synced_type}")
}

impl<S: GraphStore> Session<S> {
    /// Record that `synced_type` was synced for the group
    /// `group_type`/`group_id` in the run tagged `update_tag`.
    pub async fn merge_module_sync_metadata(
        &self,
        group_type: &str,
        group_id: impl Into<Value>,
        synced_type: &str,
        update_tag: UpdateTag,
    ) -> Result<()> {
        let group_id = group_id.into();
        let params = property_map([
            ("id", Value::from(sync_metadata_id(group_type, &group_id, synced_type))),
            ("syncedtype", Value::from(synced_type)),
            ("grouptype", Value::from(group_type)),
            ("groupid", group_id),
            (UPDATE_TAG, Value::from(update_tag)),
        ]);
        self.run_write_query(&render(&sync_metadata_query()), params).await?;
        Ok(())
    }
}
