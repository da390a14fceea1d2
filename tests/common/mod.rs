//! In-process stand-in for the pet backend, used by the integration tests.
//!
//! Serves the same routes the remote clients call, from shared in-memory
//! state that a test can script: per-action responses and delays, a slow
//! chat reply, failing endpoints, the wallet balance and a token endpoint
//! that counts fetches.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Canned answer for one care action.
#[derive(Clone)]
pub struct ActionScript {
    pub stats: Value,
    pub delay: Duration,
    pub reaction: String,
}

#[derive(Default)]
pub struct MockState {
    pub stats: Mutex<Value>,
    pub diary: Mutex<Value>,
    pub actions: Mutex<HashMap<String, ActionScript>>,
    pub failing: Mutex<HashSet<String>>,
    pub balance: AtomicI64,
    pub action_calls: AtomicUsize,
    pub token_fetches: AtomicUsize,
    pub equipped: Mutex<Vec<Value>>,
    pub chat_reply: Mutex<Value>,
    pub chat_delay: Mutex<Duration>,
    pub renamed: Mutex<Option<String>>,
}

/// Handle to a running mock backend.
#[derive(Clone)]
pub struct MockBackend {
    pub url: String,
    pub state: Arc<MockState>,
}

/// Stats payload in the backend's wire shape.
pub fn stats_json(hunger: f64, level: u32) -> Value {
    json!({
        "hunger": hunger,
        "energy": 70.0,
        "health": 80.0,
        "hygiene": 50.0,
        "mood": "happy",
        "level": level,
        "xp": 120,
        "is_sick": false
    })
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        *state.stats.lock().unwrap() = stats_json(40.0, 3);
        *state.diary.lock().unwrap() = json!([
            {
                "id": "d1",
                "mood": "happy",
                "entry_text": "Had a nap in the sun.",
                "created_at": "2026-01-02T10:00:00Z"
            }
        ]);
        *state.chat_reply.lock().unwrap() = json!({ "message": "Yum!" });
        state.balance.store(100, Ordering::SeqCst);

        let app = Router::new()
            .route("/auth/token", post(token))
            .route("/pets/:id", axum::routing::patch(rename))
            .route("/pets/:id/:tail", get(pet_resource).post(pet_action))
            .route("/wallet/balance", get(balance))
            .route("/chat", post(chat))
            .route("/accessories", get(catalog))
            .route("/accessories/equip", post(equip))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth", self.url)
    }

    pub fn set_stats(&self, stats: Value) {
        *self.state.stats.lock().unwrap() = stats;
    }

    pub fn script_action(&self, action: &str, stats: Value, delay: Duration) {
        self.state.actions.lock().unwrap().insert(
            action.to_string(),
            ActionScript {
                stats,
                delay,
                reaction: format!("{action} done"),
            },
        );
    }

    pub fn fail(&self, endpoint: &str) {
        self.state.failing.lock().unwrap().insert(endpoint.to_string());
    }

    pub fn recover(&self, endpoint: &str) {
        self.state.failing.lock().unwrap().remove(endpoint);
    }

    pub fn set_balance(&self, balance: i64) {
        self.state.balance.store(balance, Ordering::SeqCst);
    }

    pub fn set_chat_reply(&self, reply: Value) {
        *self.state.chat_reply.lock().unwrap() = reply;
    }

    pub fn set_chat_delay(&self, delay: Duration) {
        *self.state.chat_delay.lock().unwrap() = delay;
    }

    pub fn action_calls(&self) -> usize {
        self.state.action_calls.load(Ordering::SeqCst)
    }

    pub fn token_fetches(&self) -> usize {
        self.state.token_fetches.load(Ordering::SeqCst)
    }

    fn is_failing(state: &MockState, endpoint: &str) -> bool {
        state.failing.lock().unwrap().contains(endpoint)
    }
}

fn server_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "database exploded at row 42" })),
    )
        .into_response()
}

async fn token(State(state): State<Arc<MockState>>) -> Response {
    let n = state.token_fetches.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(Duration::from_millis(50)).await;
    if MockBackend::is_failing(&state, "token") {
        return server_error();
    }
    Json(json!({ "access_token": format!("token-{n}"), "expires_in": 3600 })).into_response()
}

async fn rename(
    State(state): State<Arc<MockState>>,
    Path(_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if MockBackend::is_failing(&state, "rename") {
        return server_error();
    }
    *state.renamed.lock().unwrap() = body["name"].as_str().map(str::to_string);
    StatusCode::NO_CONTENT.into_response()
}

async fn pet_resource(
    State(state): State<Arc<MockState>>,
    Path((id, tail)): Path<(String, String)>,
) -> Response {
    if MockBackend::is_failing(&state, &tail) {
        return server_error();
    }
    match tail.as_str() {
        "stats" => Json(state.stats.lock().unwrap().clone()).into_response(),
        "diary" => Json(state.diary.lock().unwrap().clone()).into_response(),
        "accessories" => {
            let records: Vec<Value> = state
                .equipped
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r["pet_id"] == id.as_str())
                .cloned()
                .collect();
            Json(records).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn pet_action(
    State(state): State<Arc<MockState>>,
    Path((_id, action)): Path<(String, String)>,
) -> Response {
    state.action_calls.fetch_add(1, Ordering::SeqCst);

    let script = state.actions.lock().unwrap().get(&action).cloned();
    if let Some(script) = &script {
        tokio::time::sleep(script.delay).await;
    }
    if MockBackend::is_failing(&state, &action) {
        return server_error();
    }

    let (stats, reaction) = match script {
        Some(script) => (script.stats, script.reaction),
        None => (state.stats.lock().unwrap().clone(), format!("{action} done")),
    };
    *state.stats.lock().unwrap() = stats.clone();

    Json(json!({
        "pet": { "stats": stats },
        "reaction": reaction,
        "notifications": ["Your pet is content"]
    }))
    .into_response()
}

async fn balance(State(state): State<Arc<MockState>>) -> Response {
    if MockBackend::is_failing(&state, "balance") {
        return server_error();
    }
    Json(json!({ "balance": state.balance.load(Ordering::SeqCst) })).into_response()
}

async fn chat(State(state): State<Arc<MockState>>, Json(_body): Json<Value>) -> Response {
    let delay = *state.chat_delay.lock().unwrap();
    tokio::time::sleep(delay).await;
    if MockBackend::is_failing(&state, "chat") {
        return server_error();
    }
    Json(state.chat_reply.lock().unwrap().clone()).into_response()
}

async fn catalog(State(state): State<Arc<MockState>>) -> Response {
    if MockBackend::is_failing(&state, "accessories") {
        return server_error();
    }
    Json(json!([
        { "id": "hat", "name": "Straw Hat", "category": "head", "price": 30 },
        { "id": "bow", "name": "Red Bow", "category": "neck", "price": 15 }
    ]))
    .into_response()
}

async fn equip(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if MockBackend::is_failing(&state, "equip") {
        return server_error();
    }
    let record = json!({
        "accessory_id": body["accessory_id"],
        "pet_id": body["pet_id"],
        "equipped": body["equipped"]
    });
    let mut equipped = state.equipped.lock().unwrap();
    equipped.retain(|r| {
        r["accessory_id"] != record["accessory_id"] || r["pet_id"] != record["pet_id"]
    });
    equipped.push(record.clone());
    Json(record).into_response()
}
