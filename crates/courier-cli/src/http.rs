//! HTTP - warp によるリクエスト面
//!
//! - POST /tasks      : タスク投入（rate limited）
//! - GET  /tasks/:id  : 状態の問い合わせ
//! - POST /users      : entity 作成（rate limited）
//! - GET  /users/:id  : entity 読み出し（cache-aside）
//! - GET  /health     : KV / primary store の疎通

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use courier_core::app::Service;
use courier_core::domain::{CourierError, EntityId, ErrorKind, NewEntity, TaskId, TaskState};

const MAX_BODY_BYTES: u64 = 16 * 1024;
const RATE_LIMITED_MSG: &str = "Too many requests. Try again later.";

#[derive(Debug, Default, Deserialize)]
struct SubmitBody {
    payload: Option<String>,
    message: Option<String>,
}

impl SubmitBody {
    fn into_payload(self) -> String {
        self.payload.or(self.message).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Submitted {
    task_id: TaskId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    task_id: TaskId,
    state: TaskState,
}

pub fn routes(
    service: Arc<Service>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let submit = warp::path("tasks")
        .and(warp::path::end())
        .and(warp::post())
        .and(client_key())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(submit_task);

    let status = warp::path!("tasks" / String)
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(task_status);

    let create_route = warp::path("users")
        .and(warp::path::end())
        .and(warp::post())
        .and(client_key())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(create_user);

    let read_route = warp::path!("users" / String)
        .and(warp::get())
        .and(with_service(service.clone()))
        .and_then(read_user);

    let health_route = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(service))
        .and_then(health);

    submit
        .or(status)
        .or(create_route)
        .or(read_route)
        .or(health_route)
        .with(warp::trace::request())
}

fn with_service(
    service: Arc<Service>,
) -> impl Filter<Extract = (Arc<Service>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// Rate-limit key for the caller: first `X-Forwarded-For` hop, then the socket peer.
fn client_key() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("x-forwarded-for")
        .and(warp::addr::remote())
        .map(|forwarded: Option<String>, remote: Option<SocketAddr>| {
            resolve_client_key(forwarded.as_deref(), remote)
        })
}

fn resolve_client_key(forwarded: Option<&str>, remote: Option<SocketAddr>) -> String {
    let hop = forwarded
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty());
    match (hop, remote) {
        (Some(hop), _) => hop.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

async fn submit_task(
    client: String,
    body: SubmitBody,
    service: Arc<Service>,
) -> Result<Response, Infallible> {
    let reply = match service.submit(&client, &body.into_payload()).await {
        Ok(task_id) => json_reply(&Submitted { task_id }, StatusCode::OK),
        Err(err) => error_reply(&err, StatusCode::SERVICE_UNAVAILABLE),
    };
    Ok(reply)
}

async fn task_status(id: String, service: Arc<Service>) -> Result<Response, Infallible> {
    let task_id = TaskId::from_raw(id);
    let reply = match service.poll_status(&task_id).await {
        Ok(state) => json_reply(&StatusView { task_id, state }, StatusCode::OK),
        Err(err) => error_reply(&err, StatusCode::SERVICE_UNAVAILABLE),
    };
    Ok(reply)
}

async fn create_user(
    client: String,
    fields: NewEntity,
    service: Arc<Service>,
) -> Result<Response, Infallible> {
    let reply = match service.create_entity(&client, fields).await {
        Ok(entity) => json_reply(&entity, StatusCode::OK),
        Err(err) => error_reply(&err, StatusCode::INTERNAL_SERVER_ERROR),
    };
    Ok(reply)
}

async fn read_user(id: String, service: Arc<Service>) -> Result<Response, Infallible> {
    let reply = match service.read_entity(&EntityId::from_raw(id)).await {
        Ok(entity) => json_reply(&entity, StatusCode::OK),
        Err(err) => error_reply(&err, StatusCode::INTERNAL_SERVER_ERROR),
    };
    Ok(reply)
}

async fn health(service: Arc<Service>) -> Result<Response, Infallible> {
    let report = service.health().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok(json_reply(&report, status))
}

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

/// `store_failure` は store 障害時のステータス（タスク系は 503、entity 系は 500）
fn error_reply(err: &CourierError, store_failure: StatusCode) -> Response {
    match err.kind() {
        ErrorKind::Validation => {
            json_reply(&json!({ "error": err.to_string() }), StatusCode::BAD_REQUEST)
        }
        ErrorKind::NotFound => {
            json_reply(&json!({ "error": err.to_string() }), StatusCode::NOT_FOUND)
        }
        ErrorKind::RateLimited => {
            warn!(error = %err, "rejected by rate limiter");
            json_reply(&json!({ "msg": RATE_LIMITED_MSG }), StatusCode::TOO_MANY_REQUESTS)
        }
        ErrorKind::Infrastructure | ErrorKind::Execution => {
            error!(error = %err, "request failed");
            json_reply(&json!({ "error": err.to_string() }), store_failure)
        }
    }
}
