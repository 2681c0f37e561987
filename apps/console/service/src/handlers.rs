//! Custom endpoints.
//!
//! The handful of routes the generic command grammar cannot express:
//! session lifecycle, two-factor enrollment, image staging and vendor
//! resource adoption. Registration is table-driven; handlers produce the
//! same response envelope as the generic pipeline.

use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{delete, get, post, MethodRouter};
use serde::Deserialize;
use serde_json::{json, Value};
use stratus_zone_client::{RpcOutcome, RpcValue};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::commands::HttpMethod;
use crate::config::Config;
use crate::dispatch::relay_response;
use crate::envelope::{self, GatewayStatus};
use crate::session::SessionError;
use crate::AppState;

const UPLOAD_FIELD: &str = "file";
const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Public,
    Authenticated,
}

/// One non-descriptor endpoint. The router is built by folding this table
/// before the wildcard route is added.
pub(crate) struct CustomRoute {
    pub path: &'static str,
    pub method: HttpMethod,
    pub access: Access,
    pub router: MethodRouter<AppState>,
}

pub(crate) fn custom_routes(config: &Config) -> Vec<CustomRoute> {
    vec![
        CustomRoute {
            path: "/api/auth",
            method: HttpMethod::Post,
            access: Access::Public,
            router: post(login),
        },
        CustomRoute {
            path: "/api/auth",
            method: HttpMethod::Get,
            access: Access::Authenticated,
            router: get(whoami),
        },
        CustomRoute {
            path: "/api/auth",
            method: HttpMethod::Delete,
            access: Access::Authenticated,
            router: delete(logout),
        },
        CustomRoute {
            path: "/api/tfa",
            method: HttpMethod::Get,
            access: Access::Authenticated,
            router: get(tfa_begin),
        },
        CustomRoute {
            path: "/api/tfa",
            method: HttpMethod::Post,
            access: Access::Authenticated,
            router: post(tfa_confirm),
        },
        CustomRoute {
            path: "/api/tfa",
            method: HttpMethod::Delete,
            access: Access::Authenticated,
            router: delete(tfa_disable),
        },
        CustomRoute {
            path: "/api/image/upload",
            method: HttpMethod::Post,
            access: Access::Authenticated,
            router: post(upload_image).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        },
        CustomRoute {
            path: "/api/vendor/import",
            method: HttpMethod::Post,
            access: Access::Authenticated,
            router: post(vendor_import),
        },
    ]
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    user: String,
    token: String,
    #[serde(default)]
    remember: bool,
    #[serde(default)]
    tfa: Option<String>,
}

/// Login. Credentials are checked against the core itself: the gateway
/// relays the own-account read as `user:token` and only mints a bearer
/// token when the core accepts that session string.
async fn login(State(state): State<AppState>, body: Bytes) -> Response {
    let request: LoginRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => {
            return envelope::respond(
                GatewayStatus::BadRequest,
                Some("user and token are required".to_string()),
                None,
            );
        }
    };
    if request.user.is_empty() || request.token.is_empty() {
        return envelope::respond(
            GatewayStatus::BadRequest,
            Some("user and token are required".to_string()),
            None,
        );
    }

    let session = format!("{}:{}", request.user, request.token);
    let zone = state.zones.default_zone();
    let outcome = state
        .zone_client
        .connect_as(&session, &zone.rpc_endpoint)
        .call("user.info", vec![RpcValue::Int(-1), RpcValue::Bool(false)])
        .await;
    let payload = match outcome {
        RpcOutcome::Success { payload } => payload,
        RpcOutcome::Empty { message } | RpcOutcome::RemoteError { message, .. } => {
            tracing::info!(user = %request.user, "login rejected by the core");
            return envelope::respond(GatewayStatus::Unauthorized, Some(message), None);
        }
        RpcOutcome::TransportFault { cause } => {
            tracing::warn!(%cause, "login relay failed");
            return envelope::error(GatewayStatus::Internal);
        }
    };

    if let Err(err) = state
        .sessions
        .tfa_gate(&request.user, request.tfa.as_deref())
        .await
    {
        return envelope::respond(GatewayStatus::Unauthorized, Some(err.to_string()), None);
    }

    let subject_id = subject_id_from(&payload);
    let issued = match state
        .sessions
        .issue(&subject_id, &request.user, &request.token, request.remember)
    {
        Ok(issued) => issued,
        Err(err) => {
            tracing::warn!(error = %err, "token minting failed");
            return envelope::error(GatewayStatus::Internal);
        }
    };
    tracing::info!(user = %request.user, remember = request.remember, "session opened");
    envelope::ok_data(json!({
        "token": issued.token,
        "expires_at": issued.claims.exp,
        "id": subject_id,
        "username": request.user,
    }))
}

async fn whoami(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = match state.sessions.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return unauthorized(err),
    };
    envelope::ok_data(json!({
        "id": identity.subject_id,
        "username": identity.username,
        "issued_at": identity.issued_at,
        "expires_at": identity.expires_at,
    }))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = match state.sessions.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return unauthorized(err),
    };
    state.sessions.forget(&identity.username).await;
    tracing::info!(user = %identity.username, "session closed");
    envelope::respond(GatewayStatus::Ok, Some("session closed".to_string()), None)
}

async fn tfa_begin(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = match state.sessions.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return unauthorized(err),
    };
    let enrollment = state.sessions.tfa_begin(&identity.username).await;
    envelope::ok_data(json!({
        "secret": enrollment.secret,
        "uri": enrollment.uri,
    }))
}

#[derive(Debug, Deserialize)]
struct TfaRequest {
    token: String,
}

async fn tfa_confirm(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let identity = match state.sessions.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return unauthorized(err),
    };
    let request: TfaRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => {
            return envelope::respond(
                GatewayStatus::BadRequest,
                Some("token is required".to_string()),
                None,
            );
        }
    };
    match state
        .sessions
        .tfa_confirm(&identity.username, &request.token)
        .await
    {
        Ok(()) => {
            tracing::info!(user = %identity.username, "two-factor enabled");
            envelope::respond(
                GatewayStatus::Ok,
                Some("two-factor enabled".to_string()),
                None,
            )
        }
        Err(err) => unauthorized(err),
    }
}

async fn tfa_disable(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let identity = match state.sessions.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return unauthorized(err),
    };
    state.sessions.tfa_disable(&identity.username).await;
    tracing::info!(user = %identity.username, "two-factor disabled");
    envelope::respond(
        GatewayStatus::Ok,
        Some("two-factor disabled".to_string()),
        None,
    )
}

/// Multipart image staging. The file lands in the upload directory under a
/// random name so a follow-up `image.allocate` can reference its path.
async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let identity = match state.sessions.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return unauthorized(err),
    };
    if let Err(err) = tokio::fs::create_dir_all(&state.config.upload_dir).await {
        tracing::warn!(error = %err, "cannot create upload directory");
        return envelope::error(GatewayStatus::Internal);
    }
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => {
                return envelope::respond(
                    GatewayStatus::BadRequest,
                    Some("malformed multipart body".to_string()),
                    None,
                );
            }
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = unique_upload_name(field.file_name());
        let path = state.config.upload_dir.join(&file_name);
        return match store_field(field, &path).await {
            Ok(size) => {
                tracing::info!(user = %identity.username, file = %file_name, size, "image staged");
                envelope::ok_data(json!({
                    "path": path.display().to_string(),
                    "size": size,
                }))
            }
            Err(StoreError::Receive) => {
                let _ = tokio::fs::remove_file(&path).await;
                envelope::respond(
                    GatewayStatus::BadRequest,
                    Some("upload interrupted".to_string()),
                    None,
                )
            }
            Err(StoreError::Write(err)) => {
                tracing::warn!(error = %err, "cannot write upload");
                let _ = tokio::fs::remove_file(&path).await;
                envelope::error(GatewayStatus::Internal)
            }
        };
    }
    envelope::respond(
        GatewayStatus::BadRequest,
        Some("multipart field \"file\" is required".to_string()),
        None,
    )
}

#[derive(Debug, Deserialize)]
struct VendorImportRequest {
    hypervisor: String,
    resource: String,
    id: i64,
}

/// Adopts a vendor-managed resource through the core's import call.
async fn vendor_import(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let identity = match state.sessions.authenticate(&headers).await {
        Ok(identity) => identity,
        Err(err) => return unauthorized(err),
    };
    let request: VendorImportRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(_) => {
            return envelope::respond(
                GatewayStatus::BadRequest,
                Some("hypervisor, resource and id are required".to_string()),
                None,
            );
        }
    };
    let zone = state.zones.default_zone();
    let outcome = state
        .zone_client
        .connect_as(&identity.session_string(), &zone.rpc_endpoint)
        .call(
            "vendor.import",
            vec![
                RpcValue::Text(request.hypervisor),
                RpcValue::Text(request.resource),
                RpcValue::Int(request.id),
            ],
        )
        .await;
    relay_response("vendor.import", outcome)
}

fn unauthorized(err: SessionError) -> Response {
    envelope::respond(GatewayStatus::Unauthorized, Some(err.to_string()), None)
}

fn subject_id_from(payload: &Value) -> String {
    match payload.pointer("/USER/ID") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => "0".to_string(),
    }
}

enum StoreError {
    Receive,
    Write(std::io::Error),
}

async fn store_field(mut field: Field<'_>, path: &std::path::Path) -> Result<u64, StoreError> {
    let mut file = tokio::fs::File::create(path).await.map_err(StoreError::Write)?;
    let mut size: u64 = 0;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                size += chunk.len() as u64;
                file.write_all(&chunk).await.map_err(StoreError::Write)?;
            }
            Ok(None) => break,
            Err(_) => return Err(StoreError::Receive),
        }
    }
    file.flush().await.map_err(StoreError::Write)?;
    Ok(size)
}

fn unique_upload_name(original: Option<&str>) -> String {
    let stem = Uuid::new_v4().simple().to_string();
    let extension = original
        .map(std::path::Path::new)
        .and_then(|name| name.extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });
    match extension {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}
