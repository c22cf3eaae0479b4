use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{OriginalUri, Path, Query, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct FlakyParams {
    pub key: String,
    #[serde(default)]
    pub fail: usize,
}

/// Shared server state: a user table and per-path hit counters.
#[derive(Clone, Default)]
pub struct AppState {
    users: Arc<RwLock<HashMap<u64, User>>>,
    hits: Arc<RwLock<BTreeMap<String, usize>>>,
}

impl AppState {
    /// State seeded with user 1 named `x`.
    pub fn seeded() -> Self {
        let mut users = HashMap::new();
        users.insert(
            1,
            User {
                id: 1,
                name: "x".to_string(),
            },
        );
        Self {
            users: Arc::new(RwLock::new(users)),
            hits: Arc::default(),
        }
    }

    async fn hit(&self, key: String) -> usize {
        let mut hits = self.hits.write().await;
        let count = hits.entry(key).or_insert(0);
        *count += 1;
        *count
    }
}

pub fn app() -> Router {
    app_with_state(AppState::seeded())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/users", post(create_user_json))
        .route("/users/form", post(create_user_form))
        .route("/users/{id}", get(get_user))
        .route("/search", get(search))
        .route("/echo", post(echo))
        .route("/status/{code}", get(status))
        .route("/flaky", get(flaky))
        .route("/hits", get(hits))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn insert_user(state: &AppState, name: String) -> User {
    let mut users = state.users.write().await;
    let id = users.keys().max().copied().unwrap_or(0) + 1;
    let user = User { id, name };
    users.insert(id, user.clone());
    log::debug!("created user {id}");
    user
}

async fn create_user_json(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> (StatusCode, Json<User>) {
    (StatusCode::CREATED, Json(insert_user(&state, input.name).await))
}

async fn create_user_form(
    State(state): State<AppState>,
    Form(input): Form<CreateUser>,
) -> (StatusCode, Json<User>) {
    (StatusCode::CREATED, Json(insert_user(&state, input.name).await))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<User>, StatusCode> {
    let users = state.users.read().await;
    users.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// Echo the query string, raw and as ordered pairs.
async fn search(
    RawQuery(raw): RawQuery,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Json<Value> {
    Json(json!({ "raw": raw, "pairs": pairs }))
}

/// Echo the request's content type and body text.
async fn echo(headers: HeaderMap, body: String) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let custom: BTreeMap<String, String> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-"))
        .filter_map(|(name, value)| {
            Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
        })
        .collect();
    Json(json!({ "content_type": content_type, "body": body, "headers": custom }))
}

/// Respond with the status in the path, counting hits.
async fn status(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(code): Path<u16>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let code = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    let hit = state.hit(uri.path().to_string()).await;
    Ok((code, Json(json!({ "status": code.as_u16(), "hit": hit }))))
}

/// Fail with 503 for the first `fail` hits on `key`, then succeed.
async fn flaky(
    State(state): State<AppState>,
    Query(params): Query<FlakyParams>,
) -> (StatusCode, Json<Value>) {
    let hit = state.hit(format!("flaky:{}", params.key)).await;
    if hit <= params.fail {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "try again", "hit": hit })))
    } else {
        (StatusCode::OK, Json(json!({ "attempts": hit })))
    }
}

async fn hits(State(state): State<AppState>) -> Json<BTreeMap<String, usize>> {
    Json(state.hits.read().await.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_to_json() {
        let user = User {
            id: 1,
            name: "x".to_string(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json, json!({"id": 1, "name": "x"}));
    }

    #[test]
    fn flaky_params_default_to_no_failures() {
        let params: FlakyParams = serde_json::from_str(r#"{"key":"a"}"#).unwrap();
        assert_eq!(params.fail, 0);
    }

    #[test]
    fn create_user_rejects_missing_name() {
        let result: Result<CreateUser, _> = serde_json::from_str(r#"{}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn hits_count_per_key() {
        let state = AppState::default();
        assert_eq!(state.hit("/a".to_string()).await, 1);
        assert_eq!(state.hit("/a".to_string()).await, 2);
        assert_eq!(state.hit("/b".to_string()).await, 1);
    }

    #[tokio::test]
    async fn seeded_state_has_user_one() {
        let state = AppState::seeded();
        let users = state.users.read().await;
        assert_eq!(users.get(&1).map(|u| u.name.as_str()), Some("x"));
    }
}
