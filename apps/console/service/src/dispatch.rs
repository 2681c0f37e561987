//! Generic command dispatch.
//!
//! Every `/api/{family}/...` request that no custom endpoint claims lands
//! here and runs the same pipeline: resolve the operation, authenticate,
//! pick a zone, marshal parameters in declared order, relay the call and
//! translate the reply. Adding a platform operation means adding one row
//! to a family table, never a new handler.

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use serde_json::{Map, Value};
use stratus_zone_client::{RpcOutcome, RpcValue};

use crate::commands::{CommandRegistry, HttpMethod, OperationDescriptor, ParamValue};
use crate::envelope::{self, GatewayStatus};
use crate::params::{self, DataSources};
use crate::session::Identity;
use crate::AppState;

/// Everything dispatch needs, owned. Pulled out of the axum extractors up
/// front so the pipeline itself has no framework types in its signature.
pub(crate) struct RequestContext {
    pub method: HttpMethod,
    pub rest: String,
    pub raw_query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

struct ResolvedRoute<'a> {
    descriptor: &'a OperationDescriptor,
    path_args: Vec<String>,
    how: &'static str,
}

#[derive(Debug, PartialEq, Eq)]
enum RouteFailure {
    UnknownOperation,
    MethodMismatch,
}

pub(crate) async fn dispatch_api(
    State(state): State<AppState>,
    Path(rest): Path<String>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(method) = HttpMethod::from_method(&method) else {
        return envelope::error(GatewayStatus::MethodNotAllowed);
    };
    let context = RequestContext {
        method,
        rest,
        raw_query,
        headers,
        body,
    };
    dispatch(&state, context).await
}

pub(crate) async fn dispatch(state: &AppState, context: RequestContext) -> Response {
    let (family, segments) = split_rest(&context.rest);
    if family.is_empty() {
        return envelope::respond(
            GatewayStatus::BadRequest,
            Some("missing command family".to_string()),
            None,
        );
    }
    if !state.registry.is_known_family(&family) {
        return envelope::error(GatewayStatus::NotFound);
    }

    let route = match resolve_route(&state.registry, context.method, &family, &segments) {
        Ok(route) => route,
        Err(RouteFailure::MethodMismatch) => {
            return envelope::error(GatewayStatus::MethodNotAllowed);
        }
        Err(RouteFailure::UnknownOperation) => return envelope::error(GatewayStatus::NotFound),
    };
    let ResolvedRoute {
        descriptor,
        path_args,
        how,
    } = route;

    let identity = if descriptor.requires_auth {
        match state.sessions.authenticate(&context.headers).await {
            Ok(identity) => Some(identity),
            Err(err) => {
                return envelope::respond(
                    GatewayStatus::Unauthorized,
                    Some(err.to_string()),
                    None,
                );
            }
        }
    } else {
        None
    };

    let body_map = match parse_body(context.method, &context.body) {
        Ok(map) => map,
        Err(reason) => {
            return envelope::respond(GatewayStatus::BadRequest, Some(reason.to_string()), None);
        }
    };

    let mut sources = DataSources::collect(
        &state.registry,
        path_args,
        context.raw_query.as_deref(),
        body_map,
    );

    let zone = match state.zones.resolve(sources.query_value("zone")) {
        Ok(zone) => zone,
        Err(err) => {
            return envelope::respond(GatewayStatus::Unavailable, Some(err.to_string()), None);
        }
    };

    let args: Vec<RpcValue> = params::resolve_args(descriptor, &mut sources)
        .iter()
        .map(ParamValue::to_rpc)
        .collect();

    let session = identity
        .as_ref()
        .map(Identity::session_string)
        .unwrap_or_default();
    let outcome = state
        .zone_client
        .connect_as(&session, &zone.rpc_endpoint)
        .call(&descriptor.name, args)
        .await;

    tracing::info!(
        operation = %descriptor.name,
        zone = zone.id,
        matched = how,
        outcome = outcome.kind(),
        "command dispatched"
    );

    relay_response(&descriptor.name, outcome)
}

/// Outcome-to-envelope mapping shared by the generic pipeline and the
/// custom relay endpoints. Remote errors stay 200 with the core's message
/// as data; transport faults never leak their cause to the client.
pub(crate) fn relay_response(operation: &str, outcome: RpcOutcome) -> Response {
    match outcome {
        RpcOutcome::Success { payload } => envelope::ok_data(payload),
        RpcOutcome::Empty { message } => {
            envelope::respond(GatewayStatus::NotFound, Some(message), None)
        }
        RpcOutcome::RemoteError { message, .. } => {
            envelope::respond(GatewayStatus::Ok, None, Some(Value::String(message)))
        }
        RpcOutcome::TransportFault { cause } => {
            tracing::warn!(operation, %cause, "zone transport fault");
            envelope::error(GatewayStatus::Internal)
        }
    }
}

/// Maps URL segments to a registered operation.
///
/// Segment names win over method defaults: a two-segment dotted verb is
/// tried first, then a single-segment verb, and only when neither names a
/// registered operation does the method's default verb apply with every
/// segment demoted to a positional argument. A matched verb whose
/// registered method differs from the request method is a mismatch, not a
/// reason to keep searching.
fn resolve_route<'a>(
    registry: &'a CommandRegistry,
    method: HttpMethod,
    family: &str,
    segments: &[String],
) -> Result<ResolvedRoute<'a>, RouteFailure> {
    if let [first, second, rest @ ..] = segments {
        let dotted = format!("{first}.{second}");
        if let Some(descriptor) = registry.resolve(family, &dotted) {
            return finish(descriptor, method, rest.to_vec(), "dotted verb");
        }
    }
    if let [first, rest @ ..] = segments {
        if let Some(descriptor) = registry.resolve(family, first) {
            return finish(descriptor, method, rest.to_vec(), "explicit verb");
        }
    }
    let fallback = default_verb(method, segments.is_empty());
    let Some(descriptor) = registry.resolve(family, fallback) else {
        return Err(RouteFailure::UnknownOperation);
    };
    finish(descriptor, method, segments.to_vec(), "method default")
}

fn finish<'a>(
    descriptor: &'a OperationDescriptor,
    method: HttpMethod,
    path_args: Vec<String>,
    how: &'static str,
) -> Result<ResolvedRoute<'a>, RouteFailure> {
    if descriptor.method != method {
        return Err(RouteFailure::MethodMismatch);
    }
    Ok(ResolvedRoute {
        descriptor,
        path_args,
        how,
    })
}

const fn default_verb(method: HttpMethod, bare_family: bool) -> &'static str {
    match method {
        HttpMethod::Get if bare_family => "pool.info",
        HttpMethod::Get => "info",
        HttpMethod::Post => "allocate",
        HttpMethod::Put => "update",
        HttpMethod::Delete => "delete",
    }
}

fn parse_body(
    method: HttpMethod,
    body: &[u8],
) -> Result<Option<Map<String, Value>>, &'static str> {
    if matches!(method, HttpMethod::Get) || body.is_empty() {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_slice(body).map_err(|_| "request body is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(Some(map)),
        _ => Err("request body must be a JSON object"),
    }
}

fn split_rest(rest: &str) -> (String, Vec<String>) {
    let mut parts = rest.split('/').filter(|part| !part.is_empty());
    let family = parts.next().unwrap_or_default().to_string();
    let segments = parts.map(str::to_string).collect();
    (family, segments)
}
