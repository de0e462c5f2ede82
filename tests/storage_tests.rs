use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use statement_analyzer::storage::{
    BlobStore, FirestoreRepository, GcsBlobStore, StatementRepository, TokenSource,
};
use statement_analyzer::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Firestore, GCS and metadata-server endpoints backed by in-process maps.
struct FakeGoogle {
    documents: Mutex<BTreeMap<(String, String), Map<String, Value>>>,
    blobs: HashMap<String, Vec<u8>>,
    page_size: usize,
    list_calls: AtomicUsize,
    token_calls: AtomicUsize,
    auth_headers: Mutex<Vec<String>>,
}

impl FakeGoogle {
    fn new(page_size: usize) -> Self {
        Self {
            documents: Mutex::new(BTreeMap::new()),
            blobs: HashMap::new(),
            page_size,
            list_calls: AtomicUsize::new(0),
            token_calls: AtomicUsize::new(0),
            auth_headers: Mutex::new(Vec::new()),
        }
    }

    fn insert(&self, collection: &str, id: &str, fields: Value) {
        let Value::Object(fields) = fields else {
            panic!("fields must be an object");
        };
        self.documents
            .lock()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), fields);
    }

    fn fields(&self, collection: &str, id: &str) -> Option<Map<String, Value>> {
        self.documents
            .lock()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    fn record_auth(&self, headers: &HeaderMap) {
        let value = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.auth_headers.lock().unwrap().push(value);
    }
}

type Shared = State<Arc<FakeGoogle>>;

#[derive(Deserialize)]
struct ListParams {
    #[serde(rename = "pageToken")]
    page_token: Option<String>,
}

fn document_name(collection: &str, id: &str) -> String {
    format!("projects/loan-app/databases/(default)/documents/{}/{}", collection, id)
}

async fn list_documents(
    State(state): Shared,
    Path((_project, _database, collection)): Path<(String, String, String)>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Json<Value> {
    state.record_auth(&headers);
    state.list_calls.fetch_add(1, Ordering::SeqCst);

    let offset: usize = params
        .page_token
        .as_deref()
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);
    let all: Vec<Value> = state
        .documents
        .lock()
        .unwrap()
        .iter()
        .filter(|((c, _), _)| *c == collection)
        .map(|((c, id), fields)| json!({ "name": document_name(c, id), "fields": fields }))
        .collect();

    let page: Vec<Value> = all.iter().skip(offset).take(state.page_size).cloned().collect();
    let next = offset + state.page_size;
    if next < all.len() {
        Json(json!({ "documents": page, "nextPageToken": next.to_string() }))
    } else {
        Json(json!({ "documents": page }))
    }
}

async fn get_document(
    State(state): Shared,
    Path((_project, _database, collection, id)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Response {
    state.record_auth(&headers);
    match state.fields(&collection, &id) {
        Some(fields) => {
            Json(json!({ "name": document_name(&collection, &id), "fields": fields }))
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}

async fn patch_document(
    State(state): Shared,
    Path((_project, _database, collection, id)): Path<(String, String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record_auth(&headers);
    let fields = body["fields"].clone();
    state.insert(&collection, &id, fields.clone());
    Json(json!({ "name": document_name(&collection, &id), "fields": fields }))
}

async fn download_object(
    State(state): Shared,
    Path((_bucket, object)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    state.record_auth(&headers);
    match state.blobs.get(&object) {
        Some(bytes) => bytes.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "no such object").into_response(),
    }
}

async fn issue_token(State(state): Shared, headers: HeaderMap) -> Response {
    if headers.get("metadata-flavor").and_then(|v| v.to_str().ok()) != Some("Google") {
        return StatusCode::FORBIDDEN.into_response();
    }
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "access_token": "metadata-token", "expires_in": 3599, "token_type": "Bearer" }))
        .into_response()
}

async fn spawn_fake(state: Arc<FakeGoogle>) -> String {
    let app = Router::new()
        .route(
            "/v1/projects/:project/databases/:database/documents/:collection",
            get(list_documents),
        )
        .route(
            "/v1/projects/:project/databases/:database/documents/:collection/:id",
            get(get_document).patch(patch_document),
        )
        .route("/storage/v1/b/:bucket/o/:object", get(download_object))
        .route("/token", get(issue_token))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn metadata_tokens(base: &str) -> TokenSource {
    TokenSource::MetadataServer {
        client: reqwest::Client::new(),
        url: format!("{}/token", base),
    }
}

fn analysis(bank: &str, deposit: f64, approved: Option<bool>) -> StatementAnalysis {
    StatementAnalysis {
        bank_name: Some(bank.to_string()),
        statement_year: Some(2023),
        monthly_deposit_mean: Some(deposit),
        monthly_withdrawal_mean: Some(-1000.0),
        monthly_rent_mean: Some(-800.0),
        monthly_utilities_mean: Some(-50.0),
        monthly_loan_payment_mean: Some(0.0),
        monthly_balance_mean: Some(300.0),
        loan_decision: approved,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_firestore_save_and_get() {
    let fake = Arc::new(FakeGoogle::new(300));
    let base = spawn_fake(fake.clone()).await;
    let repo = FirestoreRepository::new("loan-app", TokenSource::Static("static-token".into()))
        .with_base_url(format!("{}/v1", base));

    let stored = analysis("First National", 3000.0, Some(true));
    repo.save_statement("abc", &stored).await.unwrap();

    let raw = fake.fields("statements", "abc").unwrap();
    assert_eq!(raw["statement_year"], json!({ "integerValue": "2023" }));
    assert_eq!(raw["loan_decision"], json!({ "booleanValue": true }));

    assert_eq!(repo.get_statement("abc").await.unwrap(), Some(stored));
    assert_eq!(repo.get_statement("missing").await.unwrap(), None);
    assert!(fake
        .auth_headers
        .lock()
        .unwrap()
        .iter()
        .all(|h| h == "Bearer static-token"));
}

#[tokio::test]
async fn test_firestore_training_statements() {
    let fake = Arc::new(FakeGoogle::new(2));
    let base = spawn_fake(fake.clone()).await;
    let repo = FirestoreRepository::new("loan-app", metadata_tokens(&base))
        .with_base_url(format!("{}/v1", base));

    repo.save_statement("a", &analysis("A", 3000.0, Some(true)))
        .await
        .unwrap();
    repo.save_statement("b", &analysis("B", 400.0, Some(false)))
        .await
        .unwrap();
    for id in ["a", "b", "ghost", "legacy", "broken"] {
        repo.save_training_record(id).await.unwrap();
    }

    // Written by an earlier release: month-only dates and an integer label.
    fake.insert(
        "statements",
        "legacy",
        json!({
            "bank_name": { "stringValue": "Old Bank" },
            "loan_decision": { "integerValue": "1" },
            "transactions": { "arrayValue": { "values": [
                { "mapValue": { "fields": {
                    "Date": { "stringValue": "2023-03" },
                    "Transaction Details": { "stringValue": "PAYROLL" },
                    "Amount": { "doubleValue": 2500.0 }
                } } }
            ] } }
        }),
    );
    fake.insert(
        "statements",
        "broken",
        json!({ "transactions": { "stringValue": "not a list" } }),
    );
    fake.insert(
        "training",
        "zz-malformed",
        json!({ "statement_ref": { "integerValue": "7" } }),
    );

    fake.token_calls.store(0, Ordering::SeqCst);
    fake.list_calls.store(0, Ordering::SeqCst);

    let training = repo.get_training_statements().await.unwrap();
    let banks: Vec<_> = training
        .iter()
        .map(|s| s.bank_name.clone().unwrap_or_default())
        .collect();
    assert_eq!(banks, vec!["A", "B", "Old Bank"]);

    let legacy = &training[2];
    assert_eq!(legacy.loan_decision, Some(true));
    assert_eq!(
        legacy.transactions[0].date,
        chrono::NaiveDate::from_ymd_opt(2023, 3, 1)
    );

    // Six training documents in pages of two, one token for the whole pass.
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 3);
    assert_eq!(fake.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gcs_download() {
    let mut fake = FakeGoogle::new(300);
    fake.blobs
        .insert("statements/may 2023.pdf".to_string(), b"%PDF-1.4 bytes".to_vec());
    let fake = Arc::new(fake);
    let base = spawn_fake(fake.clone()).await;

    let store = GcsBlobStore::new("loan_originator_bucket", TokenSource::Static("t".into()))
        .with_base_url(base);

    let bytes = store.download("statements/may 2023.pdf").await.unwrap();
    assert_eq!(bytes, b"%PDF-1.4 bytes".to_vec());

    match store.download("statements/june.pdf").await {
        Err(StatementError::NotFound { collection, id }) => {
            assert_eq!(collection, "loan_originator_bucket");
            assert_eq!(id, "statements/june.pdf");
        }
        other => panic!("expected not found, got {:?}", other.map(|b| b.len())),
    }
    assert_eq!(fake.auth_headers.lock().unwrap()[0], "Bearer t");
}
