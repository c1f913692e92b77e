//! SurrealDB document collection
//!
//! Supports runtime protocol selection via URL scheme:
//! - `ws://` / `wss://` - WebSocket connections
//! - `http://` / `https://` - HTTP connections
//! - `mem://` - In-memory database (for testing)
//!
//! Filter documents are rendered to SurrealQL `WHERE` clauses with every value
//! passed as a bound parameter. Record ids are stored as the record key, so the
//! document id field is read back through `record::id(id)`.

use std::marker::PhantomData;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::filter::{is_operator_object, DocumentFilter};
use super::store::{DocumentCollection, FindOptions};
use crate::config::DocumentStoreConfig;
use crate::entity::Document;
use crate::error::Result;
use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

/// SurrealDB client type alias using the `Any` engine for runtime protocol selection
pub type SurrealClient = surrealdb::Surreal<surrealdb::engine::any::Any>;

static FIELD_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("field path pattern is valid")
});

type Bindings = Vec<(String, Value)>;

/// `WHERE` clause renderer collecting bound parameters
struct SurrealQl<'a> {
    id_field: &'a str,
    bindings: Bindings,
}

impl<'a> SurrealQl<'a> {
    fn new(id_field: &'a str) -> Self {
        Self {
            id_field,
            bindings: Vec::new(),
        }
    }

    fn bind(&mut self, value: &Value) -> String {
        let name = format!("p{}", self.bindings.len());
        let placeholder = format!("${}", name);
        self.bindings.push((name, value.clone()));
        placeholder
    }

    fn field(&self, field: &str) -> RepositoryResult<String> {
        if field == self.id_field {
            return Ok("record::id(id)".to_string());
        }
        if FIELD_PATH.is_match(field) {
            Ok(field.to_string())
        } else {
            Err(RepositoryError::validation_failed(
                RepositoryOperation::FilterBy,
                format!("'{}' is not a valid field path", field),
            ))
        }
    }

    /// `None` when the document matches everything
    fn document(&mut self, document: &Map<String, Value>) -> RepositoryResult<Option<String>> {
        let mut parts = Vec::new();
        for (key, value) in document {
            let part = match key.as_str() {
                "$and" => self.branches(value, " AND ")?,
                "$or" => self.branches(value, " OR ")?,
                "$nor" => format!("!{}", self.branches(value, " OR ")?),
                field => self.condition(field, value)?,
            };
            parts.push(part);
        }
        Ok(join(parts, " AND "))
    }

    fn branches(&mut self, value: &Value, joiner: &str) -> RepositoryResult<String> {
        let mut parts = Vec::new();
        for branch in value.as_array().into_iter().flatten() {
            let rendered = match branch.as_object() {
                Some(document) => self.document(document)?,
                None => None,
            };
            parts.push(rendered.unwrap_or_else(|| "true".to_string()));
        }
        Ok(format!("({})", parts.join(joiner)))
    }

    fn condition(&mut self, field: &str, condition: &Value) -> RepositoryResult<String> {
        let column = self.field(field)?;
        match condition.as_object() {
            Some(operators) if is_operator_object(condition) => {
                self.operators(&column, operators)
            }
            _ => Ok(format!("{} = {}", column, self.bind(condition))),
        }
    }

    fn operators(&mut self, column: &str, operators: &Map<String, Value>) -> RepositoryResult<String> {
        let mut parts = Vec::new();
        for (op, operand) in operators {
            let part = match op.as_str() {
                "$eq" => format!("{} = {}", column, self.bind(operand)),
                "$ne" => format!("{} != {}", column, self.bind(operand)),
                "$gt" => format!("{} > {}", column, self.bind(operand)),
                "$gte" => format!("{} >= {}", column, self.bind(operand)),
                "$lt" => format!("{} < {}", column, self.bind(operand)),
                "$lte" => format!("{} <= {}", column, self.bind(operand)),
                "$in" => format!("{} INSIDE {}", column, self.bind(operand)),
                "$nin" => format!("{} NOT INSIDE {}", column, self.bind(operand)),
                "$exists" if operand.as_bool() == Some(false) => format!("{} = NONE", column),
                "$exists" => format!("{} != NONE", column),
                "$not" => {
                    let inner = operand.as_object().cloned().unwrap_or_default();
                    format!("!({})", self.operators(column, &inner)?)
                }
                other => {
                    return Err(RepositoryError::validation_failed(
                        RepositoryOperation::FilterBy,
                        format!("unsupported operator {}", other),
                    ))
                }
            };
            parts.push(part);
        }
        Ok(join(parts, " AND ").unwrap_or_else(|| "true".to_string()))
    }
}

fn join(mut parts: Vec<String>, joiner: &str) -> Option<String> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("({})", parts.join(joiner))),
    }
}

fn where_clause(filter: &DocumentFilter, id_field: &str) -> RepositoryResult<(String, Bindings)> {
    let mut renderer = SurrealQl::new(id_field);
    let clause = renderer
        .document(filter.as_document())?
        .map(|condition| format!(" WHERE {}", condition))
        .unwrap_or_default();
    Ok((clause, renderer.bindings))
}

fn select_statement(
    filter: &DocumentFilter,
    options: &FindOptions,
    id_field: &str,
) -> RepositoryResult<(String, Bindings)> {
    let (clause, mut bindings) = where_clause(filter, id_field)?;
    let mut sql = format!(
        "SELECT *, record::id(id) AS {} FROM type::table($table){}",
        id_field, clause
    );
    if let Some((field, order)) = &options.sort {
        let column = SurrealQl::new(id_field).field(field)?;
        sql.push_str(&format!(" ORDER BY {} {}", column, order.as_sql()));
    }
    if let Some(limit) = options.limit {
        sql.push_str(" LIMIT $limit");
        bindings.push(("limit".to_string(), Value::from(limit)));
    }
    if let Some(skip) = options.skip.filter(|s| *s > 0) {
        sql.push_str(" START $start");
        bindings.push(("start".to_string(), Value::from(skip)));
    }
    Ok((sql, bindings))
}

/// Collection stored in a SurrealDB table named after [`Document::COLLECTION`]
pub struct SurrealCollection<D: Document> {
    client: SurrealClient,
    _document: PhantomData<fn() -> D>,
}

impl<D: Document> Clone for SurrealCollection<D> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<D: Document> SurrealCollection<D> {
    /// Bind a collection to a connected client
    pub fn new(client: SurrealClient) -> Self {
        Self {
            client,
            _document: PhantomData,
        }
    }

    /// The underlying client
    pub fn client(&self) -> &SurrealClient {
        &self.client
    }

    fn content(document: &D, operation: RepositoryOperation) -> RepositoryResult<Value> {
        let mut value = serde_json::to_value(document).map_err(|e| {
            RepositoryError::serialization(operation, e.to_string())
                .with_entity(D::ENTITY_NAME, document.id().clone())
        })?;
        if let Some(object) = value.as_object_mut() {
            object.remove(D::ID_FIELD);
        }
        Ok(value)
    }

    fn with_id(mut document: D) -> D {
        if document.id().is_empty() {
            document.set_id(Uuid::now_v7().simple().to_string());
        }
        document
    }

    async fn run(&self, sql: String, bindings: Bindings) -> RepositoryResult<surrealdb::Response> {
        debug!(collection = D::COLLECTION, sql = %sql, "Executing SurrealQL");
        let mut query = self.client.query(sql).bind(("table", D::COLLECTION));
        for binding in bindings {
            query = query.bind(binding);
        }
        Ok(query.await?.check()?)
    }
}

impl<D: Document> DocumentCollection for SurrealCollection<D> {
    type Document = D;

    fn name(&self) -> &str {
        D::COLLECTION
    }

    async fn find(&self, filter: &DocumentFilter, options: &FindOptions) -> RepositoryResult<Vec<D>> {
        let (sql, bindings) = select_statement(filter, options, D::ID_FIELD)?;
        let mut response = self.run(sql, bindings).await?;
        Ok(response.take::<Vec<D>>(0)?)
    }

    async fn count_documents(&self, filter: &DocumentFilter) -> RepositoryResult<u64> {
        let (clause, bindings) = where_clause(filter, D::ID_FIELD)?;
        let sql = format!("SELECT count() FROM type::table($table){} GROUP ALL", clause);
        let mut response = self.run(sql, bindings).await?;
        let count: Option<u64> = response.take((0, "count"))?;
        Ok(count.unwrap_or_default())
    }

    async fn insert_one(&self, document: D) -> RepositoryResult<D> {
        let document = Self::with_id(document);
        let content = Self::content(&document, RepositoryOperation::InsertOne)?;
        self.run(
            "CREATE type::thing($table, $id) CONTENT $content".to_string(),
            vec![
                ("id".to_string(), Value::String(document.id().clone())),
                ("content".to_string(), content),
            ],
        )
        .await?;
        Ok(document)
    }

    async fn insert_many(&self, documents: Vec<D>) -> RepositoryResult<Vec<D>> {
        let documents: Vec<D> = documents.into_iter().map(Self::with_id).collect();
        let mut sql = String::from("BEGIN TRANSACTION;");
        let mut bindings = Vec::new();
        for (i, document) in documents.iter().enumerate() {
            sql.push_str(&format!(" CREATE type::thing($table, $id{i}) CONTENT $content{i};"));
            bindings.push((format!("id{i}"), Value::String(document.id().clone())));
            bindings.push((
                format!("content{i}"),
                Self::content(document, RepositoryOperation::InsertMany)?,
            ));
        }
        sql.push_str(" COMMIT TRANSACTION;");
        self.run(sql, bindings).await?;
        Ok(documents)
    }

    async fn replace_one(&self, id: &str, document: D) -> RepositoryResult<Option<D>> {
        let content = Self::content(&document, RepositoryOperation::ReplaceOne)?;
        let sql = format!(
            "SELECT *, record::id(id) AS {} FROM type::thing($table, $id); \
             UPDATE type::thing($table, $id) CONTENT $content RETURN NONE;",
            D::ID_FIELD
        );
        let mut response = self
            .run(
                sql,
                vec![
                    ("id".to_string(), Value::String(id.to_string())),
                    ("content".to_string(), content),
                ],
            )
            .await?;
        let previous: Vec<D> = response.take(0)?;
        Ok(previous.into_iter().next())
    }

    async fn find_one_and_delete(&self, filter: &DocumentFilter) -> RepositoryResult<Option<D>> {
        let (clause, bindings) = where_clause(filter, D::ID_FIELD)?;
        // one statement, one implicit transaction
        let sql = format!(
            "SELECT *, record::id(id) AS {id_field} FROM \
             (DELETE (SELECT VALUE id FROM type::table($table){clause} LIMIT 1) RETURN BEFORE)",
            id_field = D::ID_FIELD
        );
        let mut response = self.run(sql, bindings).await?;
        let removed: Vec<D> = response.take(0)?;
        Ok(removed.into_iter().next())
    }

    async fn delete_many(&self, filter: &DocumentFilter) -> RepositoryResult<u64> {
        let (clause, bindings) = where_clause(filter, D::ID_FIELD)?;
        let sql =
            format!("RETURN array::len((DELETE type::table($table){clause} RETURN BEFORE))");
        let mut response = self.run(sql, bindings).await?;
        let count: Option<u64> = response.take(0)?;
        Ok(count.unwrap_or_default())
    }
}

/// Connect a SurrealDB client
///
/// Retries with exponential backoff up to `max_retries` times.
pub async fn connect(config: &DocumentStoreConfig) -> Result<SurrealClient> {
    let mut attempt = 0;

    loop {
        match try_connect(config).await {
            Ok(client) => {
                tracing::info!(
                    "SurrealDB connected: url={}, ns={}, db={}, attempts={}",
                    sanitize_connection_url(&config.url),
                    config.namespace,
                    config.database,
                    attempt + 1
                );
                return Ok(client);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        "Failed to connect to SurrealDB after {} attempts: {}",
                        config.max_retries + 1,
                        e
                    );
                    return Err(e.into());
                }

                let delay = config.retry_delay(attempt);
                tracing::warn!(
                    "SurrealDB connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn try_connect(config: &DocumentStoreConfig) -> RepositoryResult<SurrealClient> {
    let url_safe = sanitize_connection_url(&config.url);
    let failed = |stage: &str, e: surrealdb::Error| {
        RepositoryError::connection_failed(format!(
            "Failed to {} SurrealDB at '{}': {}",
            stage, url_safe, e
        ))
    };

    let client = surrealdb::engine::any::connect(config.url.as_str())
        .await
        .map_err(|e| failed("connect to", e))?;

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        client
            .signin(surrealdb::opt::auth::Root {
                username,
                password,
            })
            .await
            .map_err(|e| failed("authenticate with", e))?;
    }

    client
        .use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| failed("select namespace and database on", e))?;

    Ok(client)
}

/// Sanitize connection URL for safe logging (remove credentials if present)
fn sanitize_connection_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.find('@'), url.find("://")) {
        return format!("{}***{}", &url[..scheme_end + 3], &url[at_pos..]);
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentAdapter;
    use crate::entity::Entity;
    use crate::query::SortOrder;
    use crate::repository::Compose;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        rank: i64,
        is_deleted: bool,
        created_on: DateTime<Utc>,
        last_modified: Option<DateTime<Utc>>,
    }

    impl Entity for Note {
        type Key = String;
        const ENTITY_NAME: &'static str = "Note";

        fn id(&self) -> &String {
            &self.id
        }
        fn created_on(&self) -> DateTime<Utc> {
            self.created_on
        }
        fn last_modified(&self) -> Option<DateTime<Utc>> {
            self.last_modified
        }
        fn touch(&mut self, at: DateTime<Utc>) {
            self.last_modified = Some(at);
        }
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";

        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    fn note(id: &str, rank: i64, is_deleted: bool) -> Note {
        Note {
            id: id.to_string(),
            rank,
            is_deleted,
            created_on: Utc::now(),
            last_modified: None,
        }
    }

    fn mem_config() -> DocumentStoreConfig {
        DocumentStoreConfig {
            url: "mem://".to_string(),
            namespace: "test".to_string(),
            database: "test".to_string(),
            username: None,
            password: None,
            max_retries: 0,
            retry_delay_secs: 1,
        }
    }

    async fn seeded_notes() -> SurrealCollection<Note> {
        let client = connect(&mem_config()).await.unwrap();
        let collection = SurrealCollection::<Note>::new(client);
        collection
            .insert_many(vec![
                note("n1", 1, false),
                note("n2", 2, false),
                note("n3", 3, true),
                note("n4", 4, false),
            ])
            .await
            .unwrap();
        collection
    }

    fn ranks(notes: &[Note]) -> Vec<(&str, i64)> {
        notes.iter().map(|n| (n.id.as_str(), n.rank)).collect()
    }

    #[test]
    fn test_renders_composed_filter_with_bindings() {
        let filter =
            DocumentFilter::eq("status", "active").compose(DocumentFilter::gte("age", 18));
        let (clause, bindings) = where_clause(&filter, "id").unwrap();
        assert_eq!(clause, " WHERE (status = $p0 AND age >= $p1)");
        assert_eq!(bindings[0], ("p0".to_string(), Value::from("active")));
        assert_eq!(bindings[1], ("p1".to_string(), Value::from(18)));
    }

    #[test]
    fn test_renders_logical_and_set_operators() {
        let filter = DocumentFilter::none_of([
            DocumentFilter::is_in("tag", ["a", "b"]),
            DocumentFilter::exists("archived_on", true),
        ]);
        let (clause, bindings) = where_clause(&filter, "id").unwrap();
        assert_eq!(clause, " WHERE !(tag INSIDE $p0 OR archived_on != NONE)");
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn test_id_field_reads_record_key() {
        let (clause, _) = where_clause(&DocumentFilter::eq("id", "a1"), "id").unwrap();
        assert_eq!(clause, " WHERE record::id(id) = $p0");
    }

    #[test]
    fn test_select_statement_window() {
        let options = FindOptions::new().sort("views", SortOrder::Desc).skip(10).limit(5);
        let (sql, bindings) = select_statement(&DocumentFilter::all(), &options, "id").unwrap();
        assert_eq!(
            sql,
            "SELECT *, record::id(id) AS id FROM type::table($table) ORDER BY views DESC LIMIT $limit START $start"
        );
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn test_invalid_field_rejected() {
        let filter = DocumentFilter::eq("name; DELETE users", "x");
        assert!(where_clause(&filter, "id").is_err());
    }

    #[test]
    fn test_sanitize_connection_url() {
        assert_eq!(sanitize_connection_url("mem://"), "mem://");
        let sanitized = sanitize_connection_url("ws://user:pass@localhost:8000");
        assert_eq!(sanitized, "ws://***@localhost:8000");
    }

    #[tokio::test]
    async fn test_mem_connection() {
        let result = connect(&mem_config()).await;
        assert!(result.is_ok(), "Failed to connect to in-memory SurrealDB: {:?}", result.err());
    }

    #[tokio::test]
    async fn test_mem_collection_reads() {
        let collection = seeded_notes().await;

        let all = collection.find(&DocumentFilter::all(), &FindOptions::new()).await.unwrap();
        assert_eq!(ranks(&all), vec![("n1", 1), ("n2", 2), ("n3", 3), ("n4", 4)]);

        let options = FindOptions::new().sort("rank", SortOrder::Desc).skip(1).limit(2);
        let window = collection.find(&DocumentFilter::all(), &options).await.unwrap();
        assert_eq!(ranks(&window), vec![("n3", 3), ("n2", 2)]);

        let by_id = collection
            .find(&DocumentFilter::eq("id", "n2"), &FindOptions::new())
            .await
            .unwrap();
        assert_eq!(ranks(&by_id), vec![("n2", 2)]);

        let adapter = DocumentAdapter::new(collection);
        let cancel = CancellationToken::new();
        assert_eq!(adapter.count(false, &cancel).await.unwrap(), 3);
        assert_eq!(adapter.count(true, &cancel).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_mem_collection_writes() {
        let collection = seeded_notes().await;

        let generated = collection.insert_one(note("", 9, false)).await.unwrap();
        assert_eq!(generated.id.len(), 32);
        assert!(collection.insert_one(note("n1", 0, false)).await.is_err());

        let previous = collection.replace_one("n1", note("n1", 10, false)).await.unwrap();
        assert_eq!(previous.map(|n| n.rank), Some(1));
        assert!(collection.replace_one("zz", note("zz", 0, false)).await.unwrap().is_none());

        let by_id = DocumentFilter::eq("id", "n2");
        let removed = collection.find_one_and_delete(&by_id).await.unwrap();
        assert_eq!(removed.map(|n| n.id), Some("n2".to_string()));
        assert!(collection.find_one_and_delete(&by_id).await.unwrap().is_none());

        let deleted = collection.delete_many(&DocumentFilter::gte("rank", 3)).await.unwrap();
        assert_eq!(deleted, 4);
        assert_eq!(collection.delete_many(&DocumentFilter::all()).await.unwrap(), 0);
        assert_eq!(collection.count_documents(&DocumentFilter::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_deletes_remove_once() {
        let collection = seeded_notes().await;
        let filter = DocumentFilter::eq("id", "n4");

        let (first, second) = tokio::join!(
            collection.find_one_and_delete(&filter),
            collection.find_one_and_delete(&filter)
        );
        let removed = [first, second]
            .into_iter()
            .filter(|result| matches!(result, Ok(Some(_))))
            .count();
        assert!(removed <= 1);
    }
}
