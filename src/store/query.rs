//! Structured filter builder for row-store reads.
//!
//! Covers exactly what the engine needs from PostgREST: equality, `is null`,
//! half-open date ranges, ordering, and a row limit. The structured form
//! renders to PostgREST query pairs for the HTTP store and stays directly
//! interpretable by in-memory stores in tests.

#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Eq(String, String),
    IsNull(String),
    Gte(String, String),
    Lt(String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    conditions: Vec<Cond>,
    order: Option<Order>,
    limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Cond::Eq(column.into(), value.into()));
        self
    }

    pub fn is_null(mut self, column: impl Into<String>) -> Self {
        self.conditions.push(Cond::IsNull(column.into()));
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Cond::Gte(column.into(), value.into()));
        self
    }

    pub fn lt(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Cond::Lt(column.into(), value.into()));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order { column: column.into(), descending: true });
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order { column: column.into(), descending: false });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn conditions(&self) -> &[Cond] {
        &self.conditions
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn row_limit(&self) -> Option<u32> {
        self.limit
    }

    /// Render as PostgREST query pairs. The caller is responsible for URL
    /// encoding (reqwest/url handle that when the pairs are appended).
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        for cond in &self.conditions {
            pairs.push(match cond {
                Cond::Eq(col, v) => (col.clone(), format!("eq.{}", v)),
                Cond::IsNull(col) => (col.clone(), "is.null".to_string()),
                Cond::Gte(col, v) => (col.clone(), format!("gte.{}", v)),
                Cond::Lt(col, v) => (col.clone(), format!("lt.{}", v)),
            });
        }
        if let Some(order) = &self.order {
            let dir = if order.descending { "desc" } else { "asc" };
            pairs.push(("order".to_string(), format!("{}.{}", order.column, dir)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    /// Evaluate the conditions against a JSON row. Order and limit are the
    /// caller's concern; this only answers whether the row matches.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        self.conditions.iter().all(|cond| match cond {
            Cond::Eq(col, v) => field_str(row, col).map(|s| s == *v).unwrap_or(false),
            Cond::IsNull(col) => row.get(col).map(|f| f.is_null()).unwrap_or(true),
            Cond::Gte(col, v) => field_str(row, col).map(|s| s >= *v).unwrap_or(false),
            Cond::Lt(col, v) => field_str(row, col).map(|s| s < *v).unwrap_or(false),
        })
    }
}

fn field_str(row: &serde_json::Value, col: &str) -> Option<String> {
    match row.get(col)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
