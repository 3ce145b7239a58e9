//! Read helpers.
//!
//! Each runs in a read-only transaction and retries network failures only.

use crate::model::{PropertyMap, Value};
use crate::storage::{GraphStore, QueryResult};
use crate::tx::TxMode;
use crate::{Result, Session};

use super::retry::{run_with_retry, RetryClass};

impl<S: GraphStore> Session<S> {
    /// First column of every row.
    pub async fn read_list_of_values(&self, query: &str, params: PropertyMap) -> Result<Vec<Value>> {
        let result = self.read(query, params).await?;
        let columns = result.columns;
        Ok(result.rows.iter().filter_map(|row| row.first(&columns).cloned()).collect())
    }

    /// First column of the first row, if any.
    pub async fn read_single_value(&self, query: &str, params: PropertyMap) -> Result<Option<Value>> {
        let result = self.read(query, params).await?;
        Ok(result.rows.first().and_then(|row| row.first(&result.columns)).cloned())
    }

    /// Every row as a map of column to value.
    pub async fn read_list_of_dicts(&self, query: &str, params: PropertyMap) -> Result<Vec<PropertyMap>> {
        let result = self.read(query, params).await?;
        Ok(result.rows.into_iter().map(|row| row.into_map()).collect())
    }

    /// The first row as a map, if any.
    pub async fn read_single_dict(&self, query: &str, params: PropertyMap) -> Result<Option<PropertyMap>> {
        let result = self.read(query, params).await?;
        Ok(result.rows.into_iter().next().map(|row| row.into_map()))
    }

    async fn read(&self, query: &str, params: PropertyMap) -> Result<QueryResult> {
        let owned = query.to_owned();
        run_with_retry(&self.store, &self.config.retry, RetryClass::NETWORK_ONLY, TxMode::ReadOnly, query, move |tx| {
            let query = owned.clone();
            let params = params.clone();
            Box::pin(async move { tx.run(&query, params).await })
        })
        .await
    }
}
