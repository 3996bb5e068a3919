#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use attendance_engine::services::AttendanceService;
use attendance_engine::store::{Query, RowStore, StoreError};

static TRACING: OnceLock<()> = OnceLock::new();

/// Env-filtered log output for test runs (RUST_LOG=debug to see the
/// engine's store round-trips and self-heal warnings).
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// In-memory stand-in for the PostgREST row store. Interprets the same
/// structured queries and mimics merge-duplicates upsert semantics: matched
/// rows keep columns the new row doesn't supply, inserts get a fresh id.
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    next_id: AtomicI64,
    pub select_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            select_calls: AtomicUsize::new(0),
        }
    }

    /// Insert a raw row, bypassing upsert semantics. For seeding test state.
    pub fn seed(&self, table: &str, mut row: Value) {
        if row.get("id").map(|v| v.is_null()).unwrap_or(true) {
            row["id"] = json!(self.next_id.fetch_add(1, Ordering::SeqCst));
        }
        let mut tables = self.tables.lock().unwrap();
        tables.entry(table.to_string()).or_default().push(row);
    }

    /// Snapshot of all rows in a table.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        let tables = self.tables.lock().unwrap();
        tables.get(table).cloned().unwrap_or_default()
    }

    pub fn selects(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }
}

fn sort_key(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => format!("{:020}", n.as_i64().unwrap_or(0)),
        _ => String::new(),
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = query.order() {
            rows.sort_by_key(|r| sort_key(r, &order.column));
            if order.descending {
                rows.reverse();
            }
        }
        if let Some(limit) = query.row_limit() {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn upsert(
        &self,
        table: &str,
        row: Value,
        on_conflict: Option<&str>,
    ) -> Result<Value, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(keys) = on_conflict {
            let keys: Vec<&str> = keys.split(',').map(str::trim).collect();
            let matched = rows.iter_mut().find(|existing| {
                keys.iter().all(|k| {
                    let incoming = row.get(*k);
                    incoming.is_some() && existing.get(*k) == incoming
                })
            });
            if let Some(existing) = matched {
                // merge-duplicates: supplied columns overwrite, others stay
                if let (Some(target), Some(source)) = (existing.as_object_mut(), row.as_object()) {
                    for (k, v) in source {
                        target.insert(k.clone(), v.clone());
                    }
                }
                return Ok(existing.clone());
            }
        }

        let mut inserted = row;
        if inserted.get("id").map(|v| v.is_null()).unwrap_or(true) {
            inserted["id"] = json!(self.next_id.fetch_add(1, Ordering::SeqCst));
        }
        rows.push(inserted.clone());
        Ok(inserted)
    }
}

pub fn memory_service() -> (Arc<MemoryStore>, AttendanceService) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let service = AttendanceService::new(store.clone(), Duration::from_secs(60));
    (store, service)
}

/// Open worklog rows for a user, newest first.
pub fn open_worklogs(store: &MemoryStore, user_id: &str) -> Vec<Value> {
    let mut rows: Vec<Value> = store
        .rows("attendance_worklogs")
        .into_iter()
        .filter(|r| {
            r.get("user_id").and_then(|v| v.as_str()) == Some(user_id)
                && r.get("end_at").map(|v| v.is_null()).unwrap_or(true)
        })
        .collect();
    rows.sort_by_key(|r| {
        r.get("start_at")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    });
    rows.reverse();
    rows
}

pub fn closed_worklogs(store: &MemoryStore, user_id: &str) -> Vec<Value> {
    store
        .rows("attendance_worklogs")
        .into_iter()
        .filter(|r| {
            r.get("user_id").and_then(|v| v.as_str()) == Some(user_id)
                && r.get("end_at").map(|v| !v.is_null()).unwrap_or(false)
        })
        .collect()
}
