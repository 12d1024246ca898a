//! Neo4j over its HTTP transactional endpoint.
//!
//! Each statement is sent to `{uri}/db/{database}/tx/commit`, which runs it
//! in its own auto-commit transaction. Batches travel as a `$batch` list
//! parameter and are expanded server-side with `UNWIND`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{EdgeKind, EdgeRow, EmailNode, GraphStore, NodeLabel, PersonNode, StoreError};
use crate::config::GraphConfig;

const PING: &str = "RETURN 1 AS n";

const UPSERT_PEOPLE: &str = "UNWIND $batch AS row \
     MERGE (p:Person {id: row.id}) \
     SET p.email = row.email";

const UPSERT_EMAILS: &str = "UNWIND $batch AS row \
     MERGE (e:Email {id: row.id}) \
     SET e.time = row.time, e.thread = row.thread, e.body = row.body, e.filepath = row.filepath";

/// Blocking client for one Neo4j database.
pub struct Neo4jHttpStore {
    client: reqwest::blocking::Client,
    endpoint: String,
    username: String,
    password: Option<String>,
}

impl Neo4jHttpStore {
    /// Build a client for the database described by `config`. No request is
    /// made until the first call.
    pub fn new(config: &GraphConfig) -> Result<Self, StoreError> {
        let mut builder = reqwest::blocking::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: commit_endpoint(&config.uri, &config.database),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Run one statement and return the rows of its result.
    fn run(&self, statement: &str, parameters: Value) -> Result<Vec<Vec<Value>>, StoreError> {
        let payload = json!({
            "statements": [{ "statement": statement, "parameters": parameters }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, self.password.as_deref())
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        parse_response(&body)
    }

    fn write_batch<T: serde::Serialize>(&self, statement: &str, rows: &[T]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.run(statement, json!({ "batch": rows }))?;
        Ok(())
    }
}

impl GraphStore for Neo4jHttpStore {
    fn target(&self) -> String {
        self.endpoint.clone()
    }

    fn ping(&mut self) -> Result<(), StoreError> {
        let rows = self.run(PING, json!({}))?;
        if rows.is_empty() {
            return Err(StoreError::Malformed("connectivity probe returned no rows".into()));
        }
        Ok(())
    }

    fn node_exists(&mut self, label: NodeLabel, id: &str) -> Result<bool, StoreError> {
        let rows = self.run(&exists_statement(label), json!({ "id": id }))?;
        rows.first()
            .and_then(|row| row.first())
            .and_then(Value::as_bool)
            .ok_or_else(|| StoreError::Malformed(format!("existence probe for {label} returned no boolean")))
    }

    fn upsert_people(&mut self, rows: &[PersonNode]) -> Result<(), StoreError> {
        debug!(rows = rows.len(), "Upserting Person batch");
        self.write_batch(UPSERT_PEOPLE, rows)
    }

    fn upsert_emails(&mut self, rows: &[EmailNode]) -> Result<(), StoreError> {
        debug!(rows = rows.len(), "Upserting Email batch");
        self.write_batch(UPSERT_EMAILS, rows)
    }

    fn upsert_edges(&mut self, kind: EdgeKind, rows: &[EdgeRow]) -> Result<(), StoreError> {
        debug!(kind = %kind, rows = rows.len(), "Upserting relationship batch");
        self.write_batch(&edge_statement(kind), rows)
    }
}

fn commit_endpoint(uri: &str, database: &str) -> String {
    format!("{}/db/{}/tx/commit", uri.trim_end_matches('/'), database)
}

fn exists_statement(label: NodeLabel) -> String {
    format!("MATCH (n:{label} {{id: $id}}) RETURN count(n) > 0 AS exists")
}

fn edge_statement(kind: EdgeKind) -> String {
    let merge = match kind {
        EdgeKind::Sent => format!("MERGE (p)-[:{kind}]->(e)"),
        _ => format!("MERGE (e)-[:{kind}]->(p)"),
    };
    format!(
        "UNWIND $batch AS row \
         MATCH (p:Person {{id: row.person_id}}), (e:Email {{id: row.email_id}}) \
         {merge}"
    )
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// Turn a transactional-endpoint response body into result rows.
///
/// The endpoint answers `200 OK` even when the statement failed, so the
/// `errors` array is checked first.
fn parse_response(body: &str) -> Result<Vec<Vec<Value>>, StoreError> {
    let response: TxResponse =
        serde_json::from_str(body).map_err(|e| StoreError::Malformed(e.to_string()))?;

    if let Some(err) = response.errors.into_iter().next() {
        return Err(StoreError::Cypher {
            code: err.code,
            message: err.message,
        });
    }

    Ok(response
        .results
        .into_iter()
        .flat_map(|r| r.data)
        .map(|d| d.row)
        .collect())
}
