//! Firestore over its REST API.
//!
//! Documents travel as typed `Value` maps (`{"stringValue": "x"}`,
//! `{"integerValue": "3"}`, ...). The codec here converts between those and
//! plain JSON so the rest of the crate only deals with serde types.

use crate::error::{Result, StatementError};
use crate::schema::{StatementAnalysis, TrainingRecord};
use crate::storage::auth::TokenSource;
use crate::storage::repository::{
    validate_document_id, StatementRepository, STATEMENTS_COLLECTION, TRAINING_COLLECTION,
};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_DATABASE: &str = "(default)";
const LIST_PAGE_SIZE: &str = "300";

/// Encodes a JSON value as a Firestore `Value`.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Decodes a Firestore `Value` back to JSON. Non-finite doubles become null.
pub fn decode_value(value: &Value) -> Result<Value> {
    let Some(obj) = value.as_object() else {
        return Err(malformed(value));
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Err(malformed(value));
    };

    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().ok_or_else(|| malformed(value))?),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                other => other.as_i64(),
            };
            Value::from(parsed.ok_or_else(|| malformed(value))?)
        }
        "doubleValue" => match inner {
            Value::Number(n) => n
                .as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            // NaN and Infinity arrive as strings
            _ => Value::Null,
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => inner.clone(),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Value::Array(values)
        }
        "mapValue" => {
            let fields = inner.get("fields").and_then(Value::as_object);
            Value::Object(match fields {
                Some(fields) => decode_fields(fields)?,
                None => Map::new(),
            })
        }
        _ => return Err(malformed(value)),
    };
    Ok(decoded)
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

fn malformed(value: &Value) -> StatementError {
    StatementError::Storage(format!("Malformed Firestore value: {}", value))
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Clone)]
pub struct FirestoreRepository {
    client: Client,
    project_id: String,
    database: String,
    token: TokenSource,
    base_url: String,
}

impl FirestoreRepository {
    pub fn new(project_id: impl Into<String>, token: TokenSource) -> Self {
        Self {
            client: Client::new(),
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            token,
            base_url: FIRESTORE_BASE_URL.to_string(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `{base}/projects/{p}/databases/{db}/documents/{collection}[/{id}]`
    pub fn document_url(&self, collection: &str, id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StatementError::Config(format!("Invalid Firestore base URL: {}", e)))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StatementError::Config("Firestore base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty().extend([
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database.as_str(),
                "documents",
                collection,
            ]);
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn put_document(&self, collection: &str, id: &str, body: &Value) -> Result<()> {
        validate_document_id(id)?;
        let Value::Object(map) = body else {
            return Err(StatementError::Storage(format!(
                "{} document {} is not a JSON object",
                collection, id
            )));
        };

        let url = self.document_url(collection, Some(id))?;
        let token = self.token.token().await?;
        let payload = json!({ "fields": encode_fields(map) });

        let res = self
            .client
            .patch(url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StatementError::Storage(format!(
                "Writing {}/{} failed (status {}): {}",
                collection, id, status, body
            )));
        }
        debug!("Wrote {}/{}", collection, id);
        Ok(())
    }

    /// Raw Firestore fields of one document, `None` on 404.
    async fn fetch_fields(
        &self,
        token: &str,
        collection: &str,
        id: &str,
    ) -> Result<Option<Map<String, Value>>> {
        validate_document_id(id)?;
        let url = self.document_url(collection, Some(id))?;

        let res = self.client.get(url).bearer_auth(token).send().await?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StatementError::Storage(format!(
                "Reading {}/{} failed (status {}): {}",
                collection, id, status, body
            )));
        }

        let doc: Document = res.json().await?;
        Ok(Some(doc.fields))
    }

    async fn list_documents(
        &self,
        token: &str,
        collection: &str,
    ) -> Result<Vec<(String, Map<String, Value>)>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.document_url(collection, None)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", LIST_PAGE_SIZE);
                if let Some(page) = &page_token {
                    query.append_pair("pageToken", page);
                }
            }

            let res = self.client.get(url).bearer_auth(token).send().await?;
            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(StatementError::Storage(format!(
                    "Listing {} failed (status {}): {}",
                    collection, status, body
                )));
            }

            let page: ListDocumentsResponse = res.json().await?;
            for doc in page.documents {
                let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();
                out.push((id, doc.fields));
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(out)
    }
}

fn decode_statement(fields: &Map<String, Value>) -> Result<StatementAnalysis> {
    Ok(serde_json::from_value(Value::Object(decode_fields(fields)?))?)
}

#[async_trait]
impl StatementRepository for FirestoreRepository {
    async fn save_statement(&self, id: &str, analysis: &StatementAnalysis) -> Result<()> {
        info!("Saving statement analysis {}", id);
        let body = serde_json::to_value(analysis)?;
        self.put_document(STATEMENTS_COLLECTION, id, &body).await
    }

    async fn get_statement(&self, id: &str) -> Result<Option<StatementAnalysis>> {
        let token = self.token.token().await?;
        match self.fetch_fields(&token, STATEMENTS_COLLECTION, id).await? {
            Some(fields) => Ok(Some(decode_statement(&fields)?)),
            None => Ok(None),
        }
    }

    async fn save_training_record(&self, statement_id: &str) -> Result<()> {
        info!("Saving training record for statement {}", statement_id);
        let body = serde_json::to_value(TrainingRecord {
            statement_ref: statement_id.to_string(),
        })?;
        self.put_document(TRAINING_COLLECTION, statement_id, &body)
            .await
    }

    async fn get_training_statements(&self) -> Result<Vec<StatementAnalysis>> {
        // One token for the listing and every statement read that follows.
        let token = self.token.token().await?;
        let records = self.list_documents(&token, TRAINING_COLLECTION).await?;
        let mut statements = Vec::with_capacity(records.len());

        for (id, fields) in records {
            let record = decode_fields(&fields)
                .and_then(|map| Ok(serde_json::from_value::<TrainingRecord>(Value::Object(map))?));
            let statement_ref = match record {
                Ok(record) => record.statement_ref,
                Err(e) => {
                    warn!("Skipping malformed training record {}: {}", id, e);
                    continue;
                }
            };
            if validate_document_id(&statement_ref).is_err() {
                warn!("Skipping training record {} with bad ref {:?}", id, statement_ref);
                continue;
            }
            let fields = match self
                .fetch_fields(&token, STATEMENTS_COLLECTION, &statement_ref)
                .await?
            {
                Some(fields) => fields,
                None => {
                    warn!(
                        "Training record {} points at missing statement {}",
                        id, statement_ref
                    );
                    continue;
                }
            };
            match decode_statement(&fields) {
                Ok(statement) => statements.push(statement),
                Err(e) => warn!("Skipping undecodable statement {}: {}", statement_ref, e),
            }
        }

        info!("Loaded {} training statements", statements.len());
        Ok(statements)
    }
}
