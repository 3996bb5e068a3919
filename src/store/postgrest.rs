//! PostgREST-backed implementation of the row-store contract.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

use crate::config::StoreConfig;
use crate::store::{validate_ident, Query, RowStore, StoreError};

pub struct PostgrestStore {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

impl PostgrestStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self, crate::config::ConfigError> {
        Ok(Self::new(&StoreConfig::from_env()?))
    }

    fn headers(&self, prefer: &str) -> Result<HeaderMap, StoreError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|_| StoreError::InvalidIdentifier("service key".to_string()))?;
        headers.insert("apikey", key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.service_key))
                .map_err(|_| StoreError::InvalidIdentifier("service key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "Prefer",
            HeaderValue::from_str(prefer)
                .map_err(|_| StoreError::InvalidIdentifier("prefer header".to_string()))?,
        );
        Ok(headers)
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        validate_ident(table)?;
        Ok(Url::parse(&format!("{}/rest/v1/{}", self.base_url, table))?)
    }

    async fn into_json(res: reqwest::Response) -> Result<Value, StoreError> {
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(StoreError::Status { status: status.as_u16(), body });
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl RowStore for PostgrestStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut url = self.table_url(table)?;
        for (k, v) in query.to_pairs() {
            url.query_pairs_mut().append_pair(&k, &v);
        }

        tracing::debug!("store select: {} {:?}", table, url.query());
        let res = self
            .client
            .get(url)
            .headers(self.headers("return=representation")?)
            .send()
            .await?;
        let json = Self::into_json(res).await?;
        match json {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(vec![]),
            other => Err(StoreError::UnexpectedBody(format!(
                "expected array of rows, got: {}",
                other
            ))),
        }
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: Option<&str>,
    ) -> Result<Value, StoreError> {
        let mut url = self.table_url(table)?;
        if let Some(keys) = on_conflict {
            for key in keys.split(',') {
                validate_ident(key)?;
            }
            url.query_pairs_mut().append_pair("on_conflict", keys);
        }

        tracing::debug!("store upsert: {} on_conflict={:?}", table, on_conflict);
        let res = self
            .client
            .post(url)
            .headers(self.headers("resolution=merge-duplicates,return=representation")?)
            .json(&Value::Array(vec![row]))
            .send()
            .await?;
        let json = Self::into_json(res).await?;
        match json {
            Value::Array(mut rows) if !rows.is_empty() => Ok(rows.remove(0)),
            Value::Array(_) | Value::Null => Ok(Value::Null),
            other => Ok(other),
        }
    }
}
