use rusqlite::types::Value as SqlValue;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A collection scan with equality filters on dotted field paths, an
/// optional order-by, and an optional limit. This is the whole query
/// surface the site ever used against its document database.
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) collection: String,
    pub(crate) filters: Vec<(String, Value)>,
    pub(crate) order_by: Option<(String, Direction)>,
    pub(crate) limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Renders the query as SQL over the documents table. Field paths and
    /// filter values are bound as parameters, never spliced into the SQL.
    pub(crate) fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut sql =
            String::from("SELECT id, body, updated_at FROM documents WHERE collection = ?1");
        let mut params: Vec<SqlValue> = vec![SqlValue::Text(self.collection.clone())];
        for (field, value) in &self.filters {
            params.push(SqlValue::Text(json_path(field)));
            let path_index = params.len();
            params.push(scalar_param(value));
            let value_index = params.len();
            sql.push_str(&format!(
                " AND json_extract(body, ?{path_index}) = ?{value_index}"
            ));
        }
        match &self.order_by {
            Some((field, direction)) => {
                params.push(SqlValue::Text(json_path(field)));
                let path_index = params.len();
                let keyword = match direction {
                    Direction::Ascending => "ASC",
                    Direction::Descending => "DESC",
                };
                sql.push_str(&format!(
                    " ORDER BY json_extract(body, ?{path_index}) {keyword}"
                ));
            }
            None => sql.push_str(" ORDER BY id ASC"),
        }
        if let Some(limit) = self.limit {
            params.push(SqlValue::Integer(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", params.len()));
        }
        (sql, params)
    }
}

fn json_path(field: &str) -> String {
    format!("$.{field}")
}

/// Converts a JSON filter value into the SQLite value `json_extract`
/// yields for it. Booleans extract as 1/0; arrays and objects extract as
/// their JSON text.
fn scalar_param(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(*flag as i64),
        Value::Number(number) => match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or(0.0)),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
