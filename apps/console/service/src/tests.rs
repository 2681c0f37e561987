//! Service-level tests: a full router in front of stub cores that speak
//! the positional wire protocol over real sockets.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::{Config, DeploymentMode};
use crate::session::TokenClaims;
use crate::tfa;
use crate::{build_router, build_router_with_relays, RelayCapabilities};

const USER: &str = "admin";
const PASSWORD: &str = "opensesame";

// --- stub core ---------------------------------------------------------

struct StubCore {
    endpoint: String,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StubCore {
    async fn start<F>(respond: F) -> Self
    where
        F: Fn(&str, &str) -> (StatusCode, String) + Clone + Send + Sync + 'static,
    {
        let calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let app = Router::new().route(
            "/RPC2",
            post(move |body: String| {
                let recorded = recorded.clone();
                let respond = respond.clone();
                async move {
                    recorded.lock().unwrap().push(body.clone());
                    respond(&method_name(&body), &body)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            endpoint: format!("http://{addr}/RPC2"),
            calls,
        }
    }

    async fn start_platform() -> Self {
        Self::start(platform_responder).await
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn method_name(body: &str) -> String {
    let open = "<methodName>";
    let start = body.find(open).map(|at| at + open.len());
    let end = body.find("</methodName>");
    match (start, end) {
        (Some(start), Some(end)) if start <= end => body[start..end].to_string(),
        _ => String::new(),
    }
}

/// Canned behavior of a healthy core: one account, a couple of hosts, and
/// the usual error shapes.
fn platform_responder(method: &str, body: &str) -> (StatusCode, String) {
    let reply = match method {
        "stratus.user.info" => {
            if body.contains(&format!("<string>{USER}:{PASSWORD}</string>")) {
                success_reply("<USER><ID>3</ID><NAME>admin</NAME></USER>")
            } else {
                error_reply("[UserInfo] User could not be authenticated.", 0x0100)
            }
        }
        "stratus.host.pool.info" => success_reply(
            "<HOST_POOL><HOST><ID>0</ID><NAME>node0</NAME></HOST>\
             <HOST><ID>1</ID><NAME>node1</NAME></HOST></HOST_POOL>",
        ),
        "stratus.vm.pool.info" => success_reply("<VM_POOL></VM_POOL>"),
        "stratus.vm.deploy" => success_reply("42"),
        "stratus.vm.rename" => success_reply("42"),
        "stratus.image.delete" => success_reply("42"),
        "stratus.vendor.import" => success_reply("55"),
        "stratus.vm.info" => error_reply("Error getting virtual machine [999].", 0x0400),
        "stratus.host.info" => error_reply("HOST is locked.", 0x0800),
        _ => error_reply("unsupported stub method", 0x1000),
    };
    (StatusCode::OK, reply)
}

fn success_reply(payload: &str) -> String {
    reply_body(true, payload, 0)
}

fn error_reply(message: &str, code: i64) -> String {
    reply_body(false, message, code)
}

fn reply_body(success: bool, text: &str, code: i64) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><methodResponse><params><param><value>\
         <array><data>\
         <value><boolean>{}</boolean></value>\
         <value><string>{}</string></value>\
         <value><i4>{code}</i4></value>\
         </data></array>\
         </value></param></params></methodResponse>",
        u8::from(success),
        xml_escape(text),
    )
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

// --- request helpers ---------------------------------------------------

fn stub_config(dir: &TempDir, endpoint: &str) -> Config {
    let mut config = Config::for_tests(dir.path());
    config.rpc_endpoint = endpoint.to_string();
    config
}

fn gateway(dir: &TempDir, stub: &StubCore) -> Router {
    build_router(stub_config(dir, &stub.endpoint)).unwrap()
}

fn req(method: &str, uri: &str, token: Option<&str>, body: Option<&Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login_request(
    router: &Router,
    user: &str,
    password: &str,
    tfa_code: Option<&str>,
) -> (StatusCode, Value) {
    let mut body = json!({"user": user, "token": password});
    if let Some(code) = tfa_code {
        body["tfa"] = json!(code);
    }
    send(router.clone(), req("POST", "/api/auth", None, Some(&body))).await
}

async fn login(router: &Router) -> String {
    let (status, envelope) = login_request(router, USER, PASSWORD, None).await;
    assert_eq!(status, StatusCode::OK);
    envelope["data"]["token"].as_str().unwrap().to_string()
}

fn assert_envelope(envelope: &Value, id: u16) {
    assert_eq!(envelope["id"], json!(id));
    assert!(envelope["message"].is_string());
}

fn signing_key(dir: &TempDir) -> Vec<u8> {
    let raw = std::fs::read_to_string(dir.path().join("signing.key")).unwrap();
    hex::decode(raw.trim()).unwrap()
}

fn sign(claims: &Value, key: &[u8]) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(key),
    )
    .unwrap()
}

fn fresh_claims() -> Value {
    let now = Utc::now().timestamp();
    json!({"iss": "3", "aud": USER, "jti": PASSWORD, "iat": now - 5, "exp": now + 300})
}

// --- dispatch ----------------------------------------------------------

#[tokio::test]
async fn pool_listing_resolves_and_translates() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (status, envelope) = send(router.clone(), req("GET", "/api/host", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_envelope(&envelope, 200);
    let hosts = envelope["data"]["HOST_POOL"]["HOST"].as_array().unwrap();
    assert_eq!(hosts.len(), 2);
    assert_eq!(hosts[0]["ID"], json!(0));
    assert_eq!(hosts[1]["NAME"], json!("node1"));

    let call = stub.calls().pop().unwrap();
    assert!(call.contains("<methodName>stratus.host.pool.info</methodName>"));
    assert!(call.contains(
        "<params><param><value><string>admin:opensesame</string></value></param>\
         <param><value><int>-2</int></value></param>\
         <param><value><int>-1</int></value></param>\
         <param><value><int>-1</int></value></param></params>"
    ));
}

#[tokio::test]
async fn deploy_merges_path_and_body_arguments() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (status, envelope) = send(
        router.clone(),
        req(
            "POST",
            "/api/vm/deploy/42",
            Some(&token),
            Some(&json!({"host": 3})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["data"], json!("42"));

    let call = stub.calls().pop().unwrap();
    assert!(call.contains("<methodName>stratus.vm.deploy</methodName>"));
    assert!(call.contains(
        "<param><value><int>42</int></value></param>\
         <param><value><int>3</int></value></param>\
         <param><value><boolean>0</boolean></value></param>\
         <param><value><int>-1</int></value></param></params>"
    ));
}

#[tokio::test]
async fn delete_uses_the_method_default_verb() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (status, _) = send(router.clone(), req("DELETE", "/api/image/42", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let call = stub.calls().pop().unwrap();
    assert!(call.contains("<methodName>stratus.image.delete</methodName>"));
    assert!(call.contains(
        "<param><value><int>42</int></value></param>\
         <param><value><boolean>0</boolean></value></param></params>"
    ));
}

#[tokio::test]
async fn unknown_query_keys_and_values_fall_back() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (plain_status, plain) = send(router.clone(), req("GET", "/api/vm", Some(&token), None)).await;
    let (odd_status, odd) = send(
        router.clone(),
        req("GET", "/api/vm?filter=bogusKey%3D1&nosuch=key", Some(&token), None),
    )
    .await;
    assert_eq!(plain_status, StatusCode::OK);
    assert_eq!(odd_status, StatusCode::OK);
    assert_eq!(plain, odd);

    let calls = stub.calls();
    // Login call first, then the two listings with identical wire bodies.
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1], calls[2]);
}

#[tokio::test]
async fn missing_resources_map_to_404_and_action_errors_stay_200() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (status, envelope) = send(router.clone(), req("GET", "/api/vm/999", Some(&token), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(&envelope, 404);
    assert_eq!(envelope["message"], json!("Error getting virtual machine [999]."));
    assert!(envelope.get("data").is_none());

    let (status, envelope) = send(router.clone(), req("GET", "/api/host/3", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_envelope(&envelope, 200);
    assert_eq!(envelope["data"], json!("HOST is locked."));
}

#[tokio::test]
async fn explicit_verbs_and_method_mismatch() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (status, _) = send(
        router.clone(),
        req(
            "PUT",
            "/api/vm/rename/42",
            Some(&token),
            Some(&json!({"name": "web-tier"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let call = stub.calls().pop().unwrap();
    assert!(call.contains("<methodName>stratus.vm.rename</methodName>"));
    assert!(call.contains(
        "<param><value><int>42</int></value></param>\
         <param><value><string>web-tier</string></value></param></params>"
    ));

    let (status, envelope) =
        send(router.clone(), req("GET", "/api/vm/rename/42", Some(&token), None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_envelope(&envelope, 405);
}

#[tokio::test]
async fn api_root_and_unknown_family() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);

    let (status, envelope) = send(router.clone(), req("GET", "/api", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&envelope, 400);

    let (status, envelope) = send(router.clone(), req("GET", "/api/", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&envelope, 400);

    let (status, envelope) =
        send(router.clone(), req("GET", "/api/nosuchfamily/42", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_envelope(&envelope, 404);
}

#[tokio::test]
async fn request_bodies_must_be_json_objects() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (status, envelope) =
        send(router.clone(), req("POST", "/api/vm", Some(&token), Some(&json!([1, 2])))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&envelope, 400);

    let raw = Request::builder()
        .method("POST")
        .uri("/api/vm")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, envelope) = send(router.clone(), raw).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&envelope, 400);
}

// --- sessions ----------------------------------------------------------

#[tokio::test]
async fn auth_failures_yield_the_401_envelope() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let key = signing_key(&dir);
    let now = Utc::now().timestamp();

    let mut cases: Vec<(&str, Option<String>)> = vec![
        ("no header", None),
        ("garbled token", Some("not-a-jwt".to_string())),
    ];
    let expired = json!({"iss": "3", "aud": USER, "jti": PASSWORD, "iat": now - 600, "exp": now - 60});
    cases.push(("expired", Some(sign(&expired, &key))));
    let partial = json!({"iss": "3", "aud": USER, "exp": now + 300});
    cases.push(("missing claim", Some(sign(&partial, &key))));
    cases.push(("wrong key", Some(sign(&fresh_claims(), b"0123456789abcdef0123456789abcdef"))));

    for (label, token) in cases {
        let (status, envelope) =
            send(router.clone(), req("GET", "/api/host", token.as_deref(), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "case: {label}");
        assert_envelope(&envelope, 401);
    }
}

#[tokio::test]
async fn replay_guard_depends_on_deployment_mode() {
    let accepting = |method: &str, _body: &str| -> (StatusCode, String) {
        let reply = match method {
            "stratus.user.info" => success_reply("<USER><ID>3</ID></USER>"),
            "stratus.host.pool.info" => success_reply("<HOST_POOL></HOST_POOL>"),
            _ => error_reply("unsupported stub method", 0x1000),
        };
        (StatusCode::OK, reply)
    };

    let dir = TempDir::new().unwrap();
    let stub = StubCore::start(accepting).await;
    let router = gateway(&dir, &stub);
    let (_, first) = login_request(&router, USER, "secret-one", None).await;
    let token_one = first["data"]["token"].as_str().unwrap().to_string();
    let (_, second) = login_request(&router, USER, "secret-two", None).await;
    let token_two = second["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = send(router.clone(), req("GET", "/api/host", Some(&token_one), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, envelope) =
        send(router.clone(), req("GET", "/api/host", Some(&token_two), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&envelope, 401);

    let dev_dir = TempDir::new().unwrap();
    let dev_stub = StubCore::start(accepting).await;
    let mut dev_config = stub_config(&dev_dir, &dev_stub.endpoint);
    dev_config.mode = DeploymentMode::Development;
    let dev_router = build_router(dev_config).unwrap();
    let (_, first) = login_request(&dev_router, USER, "secret-one", None).await;
    let token_one = first["data"]["token"].as_str().unwrap().to_string();
    let (_, second) = login_request(&dev_router, USER, "secret-two", None).await;
    let token_two = second["data"]["token"].as_str().unwrap().to_string();
    let (status, _) = send(dev_router.clone(), req("GET", "/api/host", Some(&token_one), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(dev_router.clone(), req("GET", "/api/host", Some(&token_two), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_mints_a_decodable_token() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);

    let (status, envelope) = login_request(&router, USER, PASSWORD, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["data"]["id"], json!("3"));
    assert_eq!(envelope["data"]["username"], json!(USER));
    let token = envelope["data"]["token"].as_str().unwrap();

    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_aud = false;
    let decoded = jsonwebtoken::decode::<TokenClaims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(&signing_key(&dir)),
        &validation,
    )
    .unwrap();
    assert_eq!(decoded.claims.iss, "3");
    assert_eq!(decoded.claims.aud, USER);
    assert_eq!(decoded.claims.jti, PASSWORD);
    assert_eq!(envelope["data"]["expires_at"], json!(decoded.claims.exp));

    let (status, envelope) = login_request(&router, USER, "wrong-password", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_envelope(&envelope, 401);
    assert_eq!(
        envelope["message"],
        json!("[UserInfo] User could not be authenticated.")
    );
}

#[tokio::test]
async fn whoami_and_logout_round_trip() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (status, envelope) = send(router.clone(), req("GET", "/api/auth", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["data"]["id"], json!("3"));
    assert_eq!(envelope["data"]["username"], json!(USER));
    assert!(envelope["data"]["expires_at"].is_i64());

    let (status, _) = send(router.clone(), req("DELETE", "/api/auth", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(router.clone(), req("GET", "/api/auth", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn two_factor_gates_the_login() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (status, envelope) = send(router.clone(), req("GET", "/api/tfa", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    let secret = envelope["data"]["secret"].as_str().unwrap().to_string();
    assert!(envelope["data"]["uri"].as_str().unwrap().starts_with("otpauth://totp/"));

    let code = tfa::code_at(&secret, Utc::now().timestamp()).unwrap();
    let (status, _) = send(
        router.clone(),
        req("POST", "/api/tfa", Some(&token), Some(&json!({"token": code}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, envelope) = login_request(&router, USER, PASSWORD, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(envelope["message"], json!("second factor required"));

    let (status, _) = login_request(&router, USER, PASSWORD, Some("000000")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let code = tfa::code_at(&secret, Utc::now().timestamp()).unwrap();
    let (status, envelope) = login_request(&router, USER, PASSWORD, Some(&code)).await;
    assert_eq!(status, StatusCode::OK);
    let token = envelope["data"]["token"].as_str().unwrap().to_string();

    let (status, _) = send(router.clone(), req("DELETE", "/api/tfa", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = login_request(&router, USER, PASSWORD, None).await;
    assert_eq!(status, StatusCode::OK);
}

// --- zones and failure paths -------------------------------------------

#[tokio::test]
async fn zone_query_routes_to_the_selected_core() {
    let dir = TempDir::new().unwrap();
    let primary = StubCore::start_platform().await;
    let secondary = StubCore::start_platform().await;
    let zones_path = dir.path().join("zones.json");
    std::fs::write(
        &zones_path,
        json!([
            {"id": 0, "name": "primary", "rpc_endpoint": primary.endpoint, "event_endpoint": "tcp://127.0.0.1:2101"},
            {"id": 4, "name": "secondary", "rpc_endpoint": secondary.endpoint, "event_endpoint": "tcp://127.0.0.1:2102"}
        ])
        .to_string(),
    )
    .unwrap();
    let mut config = stub_config(&dir, &primary.endpoint);
    config.zones_path = Some(zones_path);
    let router = build_router(config).unwrap();
    let token = login(&router).await;

    let (status, _) = send(router.clone(), req("GET", "/api/host?zone=4", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    let routed = secondary.calls();
    assert_eq!(routed.len(), 1);
    assert!(routed[0].contains("<methodName>stratus.host.pool.info</methodName>"));
    // The primary only saw the login relay.
    assert!(primary.calls().iter().all(|call| call.contains("stratus.user.info")));

    let (status, envelope) =
        send(router.clone(), req("GET", "/api/host?zone=9", Some(&token), None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_envelope(&envelope, 503);
}

#[tokio::test]
async fn core_failures_stay_behind_the_generic_500() {
    // A core that answers with something other than wire markup.
    let dir = TempDir::new().unwrap();
    let garbage = StubCore::start(|method, _body| {
        let reply = if method == "stratus.user.info" {
            success_reply("<USER><ID>3</ID></USER>")
        } else {
            "splat".to_string()
        };
        (StatusCode::OK, reply)
    })
    .await;
    let router = gateway(&dir, &garbage);
    let token = login(&router).await;
    let (status, envelope) = send(router.clone(), req("GET", "/api/host", Some(&token), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&envelope, 500);
    assert_eq!(envelope["message"], json!("Internal Server Error"));
    assert!(envelope.get("data").is_none());

    // No core at all: Config::for_tests points at a closed port.
    let dead_dir = TempDir::new().unwrap();
    let dead_router = build_router(Config::for_tests(dead_dir.path())).unwrap();
    let token = sign(&fresh_claims(), &signing_key(&dead_dir));
    let (status, envelope) =
        send(dead_router.clone(), req("GET", "/api/host", Some(&token), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_envelope(&envelope, 500);
    assert_eq!(envelope["message"], json!("Internal Server Error"));
}

// --- custom endpoints ---------------------------------------------------

#[tokio::test]
async fn upload_stages_the_file() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let boundary = "stratus-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"disk.qcow2\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         HELLOIMG\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/image/upload")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, envelope) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["data"]["size"], json!(8));
    let path = envelope["data"]["path"].as_str().unwrap();
    assert!(path.ends_with(".qcow2"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "HELLOIMG");
}

#[tokio::test]
async fn oversize_uploads_are_refused() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let mut config = stub_config(&dir, &stub.endpoint);
    config.max_upload_bytes = 16;
    let router = build_router(config).unwrap();
    let token = login(&router).await;

    let boundary = "stratus-test-boundary";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"disk.raw\"\r\n\r\n\
         {}\r\n\
         --{boundary}--\r\n",
        "x".repeat(64)
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/image/upload")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, envelope) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_envelope(&envelope, 400);
}

#[tokio::test]
async fn vendor_import_relays_positional_arguments() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = gateway(&dir, &stub);
    let token = login(&router).await;

    let (status, envelope) = send(
        router.clone(),
        req(
            "POST",
            "/api/vendor/import",
            Some(&token),
            Some(&json!({"hypervisor": "vcenter", "resource": "vm", "id": 55})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["data"], json!("55"));
    let call = stub.calls().pop().unwrap();
    assert!(call.contains("<methodName>stratus.vendor.import</methodName>"));
    assert!(call.contains(
        "<param><value><string>vcenter</string></value></param>\
         <param><value><string>vm</string></value></param>\
         <param><value><int>55</int></value></param></params>"
    ));

    let (status, envelope) =
        send(router.clone(), req("PATCH", "/api/vendor/import", Some(&token), None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_envelope(&envelope, 405);
}

#[tokio::test]
async fn healthz_reports_mode_and_relays() {
    let dir = TempDir::new().unwrap();
    let stub = StubCore::start_platform().await;
    let router = build_router_with_relays(
        stub_config(&dir, &stub.endpoint),
        RelayCapabilities {
            events: true,
            console_streams: false,
        },
    )
    .unwrap();

    let (status, body) = send(router.clone(), req("GET", "/healthz", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["mode"], json!("production"));
    assert_eq!(body["zones"], json!(1));
    assert_eq!(body["relays"]["events"], json!(true));
    assert_eq!(body["relays"]["console_streams"], json!(false));
}
