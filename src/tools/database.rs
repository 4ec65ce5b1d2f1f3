//! Read-only SQL access to the demo database.
//!
//! Queries go through [`validate_select`] first: a length cap, a `SELECT`
//! prefix check and a substring denylist. The denylist is advisory. It can be
//! bypassed with encoding or whitespace tricks, and it also trips on harmless
//! identifiers such as `created_at`. The connection itself is switched to
//! `query_only` after seeding, which is what actually prevents writes.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde_json::{json, Map, Number, Value};

use super::{failure, ParamType, ParameterSchema, Tool};

/// Maximum accepted query length, in characters.
pub const MAX_QUERY_CHARS: usize = 500;

const BLOCKED_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "TRUNCATE", "EXEC", "EXECUTE", "--",
    ";--", "/*", "*/", "UNION",
];

const SEED_USERS: &[(&str, &str, &str)] = &[
    ("Alice Johnson", "alice@example.com", "Engineering"),
    ("Bob Smith", "bob@example.com", "Sales"),
    ("Carol Davis", "carol@example.com", "Engineering"),
    ("David Brown", "david@example.com", "Marketing"),
];

/// Check that `query` looks like a single read-only SELECT.
///
/// Returns the trimmed query, or the reason it was rejected.
pub fn validate_select(query: &str) -> Result<&str, String> {
    let query = query.trim();

    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(format!(
            "Query too long (max {} characters)",
            MAX_QUERY_CHARS
        ));
    }

    let normalized = query.to_uppercase();
    if !normalized.starts_with("SELECT") {
        return Err("Only SELECT queries are allowed".to_string());
    }

    if let Some(keyword) = BLOCKED_KEYWORDS
        .iter()
        .find(|keyword| normalized.contains(*keyword))
    {
        return Err(format!("Blocked dangerous keyword: {}", keyword));
    }

    Ok(query)
}

/// Shared SQLite connection holding the `users` demo table.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and seed it if empty.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// A private in-memory database, seeded the same way.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        Self::seed(&conn).context("Failed to seed demo database")?;
        conn.pragma_update(None, "query_only", true)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn seed(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                department TEXT
            );
            "#,
        )?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        if count == 0 {
            let mut insert =
                conn.prepare("INSERT INTO users (name, email, department) VALUES (?1, ?2, ?3)")?;
            for (name, email, department) in SEED_USERS {
                insert.execute(params![name, email, department])?;
            }
            tracing::info!("Seeded demo database with {} users", SEED_USERS.len());
        }
        Ok(())
    }

    /// Run a query and return every row as a JSON object keyed by column name.
    pub async fn query(&self, sql: &str) -> anyhow::Result<Vec<Map<String, Value>>> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("database connection poisoned"))?;
            let mut stmt = conn.prepare(&sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

            let rows = stmt.query_map([], |row| {
                let mut object = Map::new();
                for (i, column) in columns.iter().enumerate() {
                    object.insert(column.clone(), to_json(row.get_ref(i)?));
                }
                Ok(object)
            })?;

            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await?
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(format!("<{} byte blob>", blob.len())),
    }
}

/// Execute a validated SELECT against the demo database.
pub struct QueryDatabase {
    database: Arc<Database>,
}

impl QueryDatabase {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl Tool for QueryDatabase {
    fn name(&self) -> &str {
        "query_database"
    }

    fn description(&self) -> &str {
        "Execute a SELECT query on the database. Only SELECT queries are allowed for safety. \
         Table: users(id, name, email, department)."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::object().required("query", ParamType::String, "SQL SELECT query to execute")
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let query = match validate_select(args["query"].as_str().unwrap_or_default()) {
            Ok(query) => query,
            Err(reason) => {
                tracing::warn!("Rejected query: {}", reason);
                return Ok(failure(reason));
            }
        };

        match self.database.query(query).await {
            Ok(results) => {
                let count = results.len();
                Ok(json!({ "success": true, "results": results, "count": count }))
            }
            Err(e) => Ok(failure(e)),
        }
    }
}
