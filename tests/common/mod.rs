#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use physioflow::{ApiClient, Config};

pub const TOKEN: &str = "stub-access-token";

/// Starts `app` on an ephemeral port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn client(base_url: &str) -> ApiClient {
    let cfg = Config {
        access_token: Some(TOKEN.to_string()),
        ..Config::for_url(base_url)
    };
    ApiClient::new(&cfg).unwrap()
}

pub fn anonymous_client(base_url: &str) -> ApiClient {
    ApiClient::new(&Config::for_url(base_url)).unwrap()
}

pub fn data(value: Value) -> Json<Value> {
    Json(json!({ "data": value }))
}

pub fn error(status: StatusCode, code: &str, message: &str) -> Response {
    (status, Json(json!({ "error": { "code": code, "message": message } }))).into_response()
}

/// Stub-side bearer check: only `TOKEN` gets through.
pub struct Authed;

impl<S: Send + Sync> FromRequestParts<S> for Authed {
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| error(StatusCode::UNAUTHORIZED, "INVALID_TOKEN", "missing bearer token"))?;

            if authz.token() != TOKEN {
                return Err(error(StatusCode::UNAUTHORIZED, "INVALID_TOKEN", "unknown bearer token"));
            }
            Ok(Authed)
        }
    }
}

pub fn patient_json(code: &str) -> Value {
    json!({
        "id": "0b7e6a52-8e35-4b8f-a1f6-0d9f3b1d2c4e",
        "patient_code": code,
        "first_name": "Lan",
        "last_name": "Nguyen",
        "full_name_vi": "Nguyễn Thị Lan",
        "status": "active",
        "created_at": "2026-09-01T08:00:00Z"
    })
}

pub fn insurance_json(card: &str) -> Value {
    json!({
        "id": "3f6b1c2d-4e5f-4a6b-8c7d-9e0f1a2b3c4d",
        "patient_id": "0b7e6a52-8e35-4b8f-a1f6-0d9f3b1d2c4e",
        "card_number": card,
        "created_at": "2026-01-01T00:00:00Z"
    })
}
