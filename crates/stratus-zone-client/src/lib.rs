//! XML-RPC transport client for Stratus zones.
//!
//! A [`ZoneClient`] holds one pooled HTTP client; [`ZoneClient::connect_as`]
//! binds it to an identity and a zone endpoint. Every call returns an
//! [`RpcOutcome`]: the full translation of the cluster core's reply
//! conventions, so callers never branch on markup or HTTP details.

use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub mod wire;

pub use wire::{RpcReply, RpcValue, WireError};

/// Fault codes the cluster core reports through its reply channel.
pub const FAULT_AUTHENTICATION: i64 = 0x0100;
pub const FAULT_AUTHORIZATION: i64 = 0x0200;
pub const FAULT_NO_EXISTS: i64 = 0x0400;
pub const FAULT_ACTION: i64 = 0x0800;
pub const FAULT_API: i64 = 0x1000;
pub const FAULT_INTERNAL: i64 = 0x2000;

const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_NAMESPACE: &str = "stratus.";

#[derive(Debug, Clone)]
pub struct ZoneClientConfig {
    /// Per-call deadline unless a caller overrides it.
    pub timeout: Duration,
    /// Prefix prepended to every operation name on the wire.
    pub namespace: String,
}

impl Default for ZoneClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ZoneClientError {
    #[error("failed to construct http client: {0}")]
    Build(String),
}

/// Every way a call can end. Transport problems are a variant, not an `Err`,
/// so the dispatch layer maps one union to one response table.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcOutcome {
    /// Core reported success; payload markup already translated to JSON.
    Success { payload: Value },
    /// Core reported "no such object" through its reply channel.
    Empty { message: String },
    /// Core reported a structured error other than "no such object".
    RemoteError { code: i64, message: String },
    /// Connection, deadline, HTTP, or markup failure. The cause stays in
    /// logs; surfaces must show a generic message only.
    TransportFault { cause: String },
}

impl RpcOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Empty { .. } => "empty",
            Self::RemoteError { .. } => "remote_error",
            Self::TransportFault { .. } => "transport_fault",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZoneClient {
    http: reqwest::Client,
    config: ZoneClientConfig,
}

impl ZoneClient {
    pub fn new(config: ZoneClientConfig) -> Result<Self, ZoneClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ZoneClientError::Build(err.to_string()))?;
        Ok(Self { http, config })
    }

    /// Binds the pooled client to one identity and one zone endpoint.
    ///
    /// The session string travels as the first positional argument of every
    /// call, exactly as the core expects. Relay processes resolve a token to
    /// an identity first, then use this to speak as that identity.
    pub fn connect_as(&self, session: &str, endpoint: &str) -> ZoneConnection {
        ZoneConnection {
            http: self.http.clone(),
            namespace: self.config.namespace.clone(),
            timeout: self.config.timeout,
            endpoint: normalize_endpoint(endpoint),
            session: session.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZoneConnection {
    http: reqwest::Client,
    namespace: String,
    timeout: Duration,
    endpoint: String,
    session: String,
}

impl ZoneConnection {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn call(&self, op: &str, args: Vec<RpcValue>) -> RpcOutcome {
        self.call_with_deadline(op, args, self.timeout).await
    }

    pub async fn call_with_deadline(
        &self,
        op: &str,
        args: Vec<RpcValue>,
        deadline: Duration,
    ) -> RpcOutcome {
        let method = qualified_op(&self.namespace, op);
        let mut positional = Vec::with_capacity(args.len() + 1);
        positional.push(RpcValue::Text(self.session.clone()));
        positional.extend(args);
        let body = wire::encode_call(&method, &positional);
        let request_id = Uuid::new_v4().simple().to_string();
        let started = Instant::now();

        let sent = self
            .http
            .post(&self.endpoint)
            .header("content-type", "text/xml")
            .header("x-request-id", &request_id)
            .timeout(deadline)
            .body(body)
            .send()
            .await;
        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                let cause = if err.is_timeout() {
                    format!("deadline exceeded after {}ms", deadline.as_millis())
                } else {
                    format!("request failed: {err}")
                };
                tracing::debug!(op = method.as_str(), %request_id, cause, "zone call failed");
                return RpcOutcome::TransportFault { cause };
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                return RpcOutcome::TransportFault {
                    cause: format!("failed to read reply body: {err}"),
                };
            }
        };
        let outcome = translate_reply(status, &text);
        tracing::debug!(
            op = method.as_str(),
            %request_id,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = outcome.kind(),
            "zone call"
        );
        outcome
    }
}

/// Single translation point from a raw HTTP reply to the outcome union.
///
/// A body that parses as a reply is translated regardless of the HTTP
/// status: some fronting proxies wrap core errors in HTTP errors, and the
/// "no such object" signal must still come through as [`RpcOutcome::Empty`].
pub fn translate_reply(status: u16, body: &str) -> RpcOutcome {
    match wire::parse_response(body) {
        Ok(RpcReply::Parameters(values)) => translate_parameters(values),
        Ok(RpcReply::Fault { code, message }) => RpcOutcome::RemoteError { code, message },
        Err(err) => {
            let cause = if (200..300).contains(&status) {
                format!("unparseable reply: {err}")
            } else {
                format!("http status {status}: {err}")
            };
            RpcOutcome::TransportFault { cause }
        }
    }
}

fn translate_parameters(values: Vec<RpcValue>) -> RpcOutcome {
    // Replies are one array parameter [success, payload, code]; tolerate
    // cores that flatten the fields into separate parameters.
    let fields = if values.len() == 1 {
        match values.into_iter().next() {
            Some(RpcValue::Array(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    } else {
        values
    };
    let mut fields = fields.into_iter();
    let success = match fields.next() {
        Some(RpcValue::Bool(flag)) => flag,
        Some(RpcValue::Int(n)) => n != 0,
        _ => {
            return RpcOutcome::TransportFault {
                cause: "reply missing success flag".to_string(),
            };
        }
    };
    let payload = fields.next();
    let code = match fields.next() {
        Some(RpcValue::Int(n)) => n,
        _ => 0,
    };

    if success {
        return RpcOutcome::Success {
            payload: payload_json(payload),
        };
    }
    let message = match payload {
        Some(RpcValue::Text(text)) => text,
        Some(other) => rpc_value_json(other).to_string(),
        None => String::new(),
    };
    if code == FAULT_NO_EXISTS {
        RpcOutcome::Empty { message }
    } else {
        RpcOutcome::RemoteError { code, message }
    }
}

fn payload_json(payload: Option<RpcValue>) -> Value {
    match payload {
        None => Value::Null,
        Some(RpcValue::Text(text)) => {
            if text.trim_start().starts_with('<') {
                match wire::markup_to_json(&text) {
                    Ok(json) => json,
                    Err(_) => Value::String(text),
                }
            } else {
                Value::String(text)
            }
        }
        Some(other) => rpc_value_json(other),
    }
}

fn rpc_value_json(value: RpcValue) -> Value {
    match value {
        RpcValue::Int(n) => Value::Number(n.into()),
        RpcValue::Bool(flag) => Value::Bool(flag),
        RpcValue::Double(d) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        RpcValue::Text(text) => Value::String(text),
        RpcValue::Array(items) => Value::Array(items.into_iter().map(rpc_value_json).collect()),
        RpcValue::Struct(members) => Value::Object(
            members
                .into_iter()
                .map(|(name, member)| (name, rpc_value_json(member)))
                .collect(),
        ),
    }
}

fn qualified_op(namespace: &str, op: &str) -> String {
    format!("{namespace}{op}")
}

fn normalize_endpoint(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}
