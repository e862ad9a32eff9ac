//! In-process fakes of the YouTube Live API, Google's token endpoint and the CMS.
//!
//! The YouTube fake keeps just enough state (broadcasts, streams, lifecycle) to drive the real
//! client over HTTP, and records every API request with its arrival time so tests can
//! assert on ordering and spacing.

use crate::content_store::{Collections, RestContentStore};
use crate::credentials::{CredentialManager, MemoryTokenStore, TokenStore};
use crate::oauth::{OAuthConfig, OAuthManager};
use crate::youtube_api::YouTubeClient;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::{self, Bytes};
use hyper::service::service_fn;
use hyper::{Request, Response};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Broadcasts are listed two per page so paging gets exercised.
const PAGE_SIZE: usize = 2;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    /// Path including the `/youtube/v3` prefix.
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub authorization: Option<String>,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct FakeState {
    requests: Vec<RecordedRequest>,
    token_requests: usize,
    reject_refresh: bool,
    failures: HashMap<String, (u16, String)>,
    /// Insertion order; newest is listed first.
    broadcasts: Vec<Value>,
    streams: Vec<Value>,
    next_broadcast: usize,
    next_stream: usize,
}

impl FakeState {
    fn broadcast_mut(&mut self, id: &str) -> Option<&mut Value> {
        self.broadcasts.iter_mut().find(|b| b["id"] == id)
    }

    fn stream_mut(&mut self, id: &str) -> Option<&mut Value> {
        self.streams.iter_mut().find(|s| s["id"] == id)
    }

    fn handle_token(&mut self) -> (u16, Value) {
        self.token_requests += 1;
        if self.reject_refresh {
            return (
                400,
                json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."}),
            );
        }
        (
            200,
            json!({
                "access_token": format!("fresh-access-{}", self.token_requests),
                "token_type": "Bearer",
                "expires_in": 3600,
            }),
        )
    }

    fn handle_api(
        &mut self,
        method: &Method,
        route: &str,
        query: &BTreeMap<String, String>,
        body: Option<Value>,
    ) -> (u16, Value) {
        if let Some((status, body)) = self.failures.get(route) {
            let body = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.clone()));
            return (*status, body);
        }
        let id = query.get("id").cloned().unwrap_or_default();

        match (method.as_str(), route) {
            ("POST", "liveBroadcasts") => {
                self.next_broadcast += 1;
                let body = body.unwrap_or_default();
                let broadcast = json!({
                    "id": format!("B{}", self.next_broadcast),
                    "snippet": {
                        "title": body["snippet"]["title"],
                        "publishedAt": "2026-10-18T09:00:00Z",
                        "scheduledStartTime": body["snippet"]["scheduledStartTime"],
                    },
                    "status": {
                        "lifeCycleStatus": "created",
                        "privacyStatus": body["status"]["privacyStatus"],
                        "recordingStatus": "notRecording",
                    },
                    "contentDetails": body["contentDetails"],
                });
                self.broadcasts.push(broadcast.clone());
                (200, broadcast)
            }
            ("POST", "liveStreams") => {
                self.next_stream += 1;
                let id = format!("S{}", self.next_stream);
                let body = body.unwrap_or_default();
                let stream = json!({
                    "id": id,
                    "snippet": {"title": body["snippet"]["title"]},
                    "cdn": {
                        "ingestionType": "rtmp",
                        "resolution": "variable",
                        "frameRate": "variable",
                        "ingestionInfo": {
                            "streamName": format!("key-{id}"),
                            "ingestionAddress": "rtmp://a.rtmp.youtube.com/live2",
                            "backupIngestionAddress": "rtmp://b.rtmp.youtube.com/live2?backup=1",
                        },
                    },
                    "status": {"streamStatus": "ready", "healthStatus": {"status": "noData"}},
                });
                self.streams.push(stream.clone());
                (200, stream)
            }
            ("POST", "liveBroadcasts/bind") => {
                let stream_id = query.get("streamId").cloned().unwrap_or_default();
                match self.broadcast_mut(&id) {
                    Some(broadcast) => {
                        broadcast["contentDetails"]["boundStreamId"] = json!(stream_id);
                        broadcast["status"]["lifeCycleStatus"] = json!("ready");
                        (200, broadcast.clone())
                    }
                    None => not_found("liveBroadcastNotFound"),
                }
            }
            ("POST", "liveBroadcasts/transition") => {
                let target = query.get("broadcastStatus").cloned().unwrap_or_default();
                let Some(broadcast) = self.broadcast_mut(&id) else {
                    return not_found("liveBroadcastNotFound");
                };
                if broadcast["status"]["lifeCycleStatus"] == target.as_str() {
                    return (
                        403,
                        json!({"error": {
                            "code": 403,
                            "message": "Redundant transition",
                            "errors": [{"reason": "redundantTransition"}],
                        }}),
                    );
                }
                broadcast["status"]["lifeCycleStatus"] = json!(target);
                broadcast["status"]["recordingStatus"] = json!(match target.as_str() {
                    "live" => "recording",
                    "complete" => "recorded",
                    _ => "notRecording",
                });
                let broadcast = broadcast.clone();
                let stream_id = broadcast["contentDetails"]["boundStreamId"]
                    .as_str()
                    .map(str::to_string);
                if let Some(stream) = stream_id.and_then(|s| self.stream_mut(&s)) {
                    let (stream_status, health) = match target.as_str() {
                        "complete" => ("inactive", "noData"),
                        _ => ("active", "good"),
                    };
                    stream["status"] =
                        json!({"streamStatus": stream_status, "healthStatus": {"status": health}});
                }
                (200, broadcast)
            }
            ("GET", "liveBroadcasts") if query.contains_key("id") => {
                let items: Vec<_> = self
                    .broadcasts
                    .iter()
                    .filter(|b| b["id"] == id.as_str())
                    .cloned()
                    .collect();
                (200, list("youtube#liveBroadcastListResponse", items, None))
            }
            ("GET", "liveBroadcasts") => {
                let start: usize = query
                    .get("pageToken")
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(0);
                let newest_first: Vec<_> = self.broadcasts.iter().rev().cloned().collect();
                let end = (start + PAGE_SIZE).min(newest_first.len());
                let next = (end < newest_first.len()).then(|| end.to_string());
                let page = newest_first.get(start..end).unwrap_or_default().to_vec();
                (200, list("youtube#liveBroadcastListResponse", page, next))
            }
            ("GET", "liveStreams") => {
                let items: Vec<_> = self
                    .streams
                    .iter()
                    .filter(|s| s["id"] == id.as_str())
                    .cloned()
                    .collect();
                (200, list("youtube#liveStreamListResponse", items, None))
            }
            _ => not_found("unknownRoute"),
        }
    }
}

fn not_found(reason: &str) -> (u16, Value) {
    (
        404,
        json!({"error": {"code": 404, "message": reason, "errors": [{"reason": reason}]}}),
    )
}

fn list(kind: &str, items: Vec<Value>, next_page_token: Option<String>) -> Value {
    let mut response = json!({
        "kind": kind,
        "pageInfo": {"totalResults": items.len(), "resultsPerPage": PAGE_SIZE},
        "items": items,
    });
    if let Some(token) = next_page_token {
        response["nextPageToken"] = json!(token);
    }
    response
}

/// A request as one of the fakes received it.
#[derive(Debug, Clone)]
pub(crate) struct Received {
    pub method: Method,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub authorization: Option<String>,
    pub body: Bytes,
    pub at: Instant,
}

type Handler = Arc<dyn Fn(Received) -> (u16, Option<Value>) + Send + Sync>;

/// Serves `handler` on a loopback port until the returned task is aborted.
async fn listen(handler: Handler) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        loop {
            let Ok((conn, _)) = listener.accept().await else {
                return;
            };
            let handler = handler.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let handler = handler.clone();
                    async move { Ok::<_, Infallible>(respond(&*handler, req).await) }
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(hyper_util::rt::TokioIo::new(conn), service)
                    .await;
            });
        }
    });
    (addr, server)
}

async fn respond(
    handler: &(dyn Fn(Received) -> (u16, Option<Value>) + Send + Sync),
    req: Request<body::Incoming>,
) -> Response<Full<Bytes>> {
    let at = Instant::now();
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map(|b| b.to_bytes())
        .unwrap_or_default();
    let query = form_urlencoded::parse(parts.uri.query().unwrap_or("").as_bytes())
        .into_owned()
        .collect();
    let authorization = parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (status, json) = handler(Received {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query,
        authorization,
        body,
        at,
    });

    let response = Response::builder().status(StatusCode::from_u16(status).unwrap());
    let response = match json {
        Some(json) => response
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(json.to_string()))),
        None => response.body(Full::new(Bytes::new())),
    };
    response.unwrap()
}

/// A running fake; the server stops when this is dropped.
pub(crate) struct FakeYouTube {
    addr: SocketAddr,
    state: Arc<Mutex<FakeState>>,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for FakeYouTube {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl FakeYouTube {
    pub(crate) async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let server_state = state.clone();
        let (addr, server) = listen(Arc::new(move |req: Received| {
            let mut state = server_state.lock().unwrap();
            let (status, json) = state.handle(req);
            (status, Some(json))
        }))
        .await;

        Self {
            addr,
            state,
            server,
        }
    }

    pub(crate) fn api_base(&self) -> String {
        format!("http://{}/youtube/v3", self.addr)
    }

    pub(crate) fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            auth_url: format!("http://{}/auth", self.addr),
            token_url: format!("http://{}/token", self.addr),
            revocation_url: format!("http://{}/revoke", self.addr),
        }
    }

    pub(crate) fn credentials(&self, store: Arc<dyn TokenStore>) -> CredentialManager {
        let oauth = OAuthManager::new(self.oauth_config()).unwrap();
        CredentialManager::new(store, Arc::new(oauth))
    }

    pub(crate) fn client(&self, store: Arc<dyn TokenStore>) -> YouTubeClient {
        YouTubeClient::new(self.credentials(store), self.api_base()).unwrap()
    }

    /// A client holding a valid access token `access-0`.
    pub(crate) fn signed_in_client(&self) -> YouTubeClient {
        let client = self.client(Arc::new(MemoryTokenStore::new()));
        client
            .credentials()
            .set_tokens("access-0", Some("refresh-0"), Some(Duration::from_secs(3600)))
            .unwrap();
        client
    }

    /// Makes every request to `route` (e.g. `liveBroadcasts/bind`) fail with `status`.
    pub(crate) fn fail(&self, route: &str, status: u16, body: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(route.to_string(), (status, body.to_string()));
    }

    pub(crate) fn reject_refresh(&self) {
        self.state.lock().unwrap().reject_refresh = true;
    }

    pub(crate) fn set_life_cycle(&self, broadcast_id: &str, status: &str) {
        let mut state = self.state.lock().unwrap();
        let broadcast = state.broadcast_mut(broadcast_id).unwrap();
        broadcast["status"]["lifeCycleStatus"] = json!(status);
    }

    /// Drops a stream so lookups for it come back empty.
    pub(crate) fn forget_stream(&self, stream_id: &str) {
        self.state
            .lock()
            .unwrap()
            .streams
            .retain(|s| s["id"] != stream_id);
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub(crate) fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub(crate) fn token_requests(&self) -> usize {
        self.state.lock().unwrap().token_requests
    }

    /// The `broadcastStatus` of every transition request, in arrival order.
    pub(crate) fn transitions(&self) -> Vec<(String, Instant)> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with("/liveBroadcasts/transition"))
            .map(|r| (r.query.get("broadcastStatus").cloned().unwrap_or_default(), r.at))
            .collect()
    }
}

impl FakeState {
    fn handle(&mut self, req: Received) -> (u16, Value) {
        if req.path == "/token" {
            return self.handle_token();
        }
        let Some(route) = req.path.strip_prefix("/youtube/v3/") else {
            return not_found("unknownRoute");
        };
        let route = route.to_string();
        self.requests.push(RecordedRequest {
            method: req.method.clone(),
            path: req.path.clone(),
            query: req.query.clone(),
            authorization: req.authorization.clone(),
            at: req.at,
        });
        if req.authorization.is_none() {
            return (401, json!({"error": {"code": 401, "message": "Login Required"}}));
        }
        let body = serde_json::from_slice(&req.body).ok();
        self.handle_api(&req.method, &route, &req.query, body)
    }
}

#[derive(Debug, Default)]
struct CmsState {
    requests: Vec<Received>,
    /// Keyed by collection name, in creation order.
    collections: BTreeMap<String, Vec<Value>>,
    failures: HashMap<String, (u16, String)>,
    next_id: u64,
}

impl CmsState {
    fn handle(&mut self, req: Received) -> (u16, Option<Value>) {
        self.requests.push(req.clone());
        let Some(rest) = req.path.strip_prefix("/api/") else {
            return (404, Some(cms_error(404, "NotFoundError", "Not Found")));
        };
        let (collection, document_id) = match rest.split_once('/') {
            Some((collection, id)) => (collection.to_string(), Some(id.to_string())),
            None => (rest.to_string(), None),
        };
        if let Some((status, body)) = self.failures.get(&collection) {
            return (*status, Some(cms_error(*status, "ApplicationError", body)));
        }
        let data = serde_json::from_slice::<Value>(&req.body)
            .ok()
            .map(|b| b["data"].clone());

        match (req.method.as_str(), document_id) {
            ("GET", None) => {
                let records = self.collections.get(&collection).cloned().unwrap_or_default();
                let mut records: Vec<_> = match req.query.get("sort").map(String::as_str) {
                    Some("createdAt:desc") => records.into_iter().rev().collect(),
                    _ => records,
                };
                let total = records.len();
                let page_size: usize = req
                    .query
                    .get("pagination[pageSize]")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(25);
                records.truncate(page_size);
                (
                    200,
                    Some(json!({
                        "data": records,
                        "meta": {"pagination": {"page": 1, "pageSize": page_size, "pageCount": total.div_ceil(page_size.max(1)), "total": total}},
                    })),
                )
            }
            ("POST", None) => {
                let Some(Value::Object(fields)) = data else {
                    return (400, Some(cms_error(400, "ValidationError", "Missing \"data\" payload in the request body")));
                };
                self.next_id += 1;
                let mut record = Value::Object(fields);
                record["id"] = json!(self.next_id);
                record["documentId"] = json!(format!("doc{}", self.next_id));
                record["createdAt"] = json!(format!("2026-10-18T09:00:{:02}.000Z", self.next_id));
                self.collections
                    .entry(collection)
                    .or_default()
                    .push(record.clone());
                (201, Some(json!({"data": record, "meta": {}})))
            }
            ("PUT", Some(id)) => {
                let Some(Value::Object(fields)) = data else {
                    return (400, Some(cms_error(400, "ValidationError", "Missing \"data\" payload in the request body")));
                };
                let Some(record) = self
                    .collections
                    .get_mut(&collection)
                    .and_then(|records| records.iter_mut().find(|r| r["documentId"] == id.as_str()))
                else {
                    return (404, Some(cms_error(404, "NotFoundError", "Not Found")));
                };
                for (key, value) in fields {
                    record[key] = value;
                }
                (200, Some(json!({"data": record.clone(), "meta": {}})))
            }
            ("DELETE", Some(id)) => {
                let records = self.collections.entry(collection).or_default();
                let before = records.len();
                records.retain(|r| r["documentId"] != id.as_str());
                if records.len() == before {
                    (404, Some(cms_error(404, "NotFoundError", "Not Found")))
                } else {
                    (204, None)
                }
            }
            _ => (405, Some(cms_error(405, "MethodNotAllowedError", "Method Not Allowed"))),
        }
    }
}

fn cms_error(status: u16, name: &str, message: &str) -> Value {
    json!({"data": null, "error": {"status": status, "name": name, "message": message, "details": {}}})
}

/// In-process fake of a Strapi v5 REST API.
pub(crate) struct FakeCms {
    addr: SocketAddr,
    state: Arc<Mutex<CmsState>>,
    server: tokio::task::JoinHandle<()>,
}

impl Drop for FakeCms {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl FakeCms {
    pub(crate) async fn start() -> Self {
        let state = Arc::new(Mutex::new(CmsState::default()));
        let server_state = state.clone();
        let (addr, server) =
            listen(Arc::new(move |req: Received| server_state.lock().unwrap().handle(req))).await;
        Self {
            addr,
            state,
            server,
        }
    }

    pub(crate) fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A store using the default collections and the API token `cms-token`.
    pub(crate) fn store(&self) -> RestContentStore {
        RestContentStore::new(self.url(), Some("cms-token".to_string()), Collections::default())
            .unwrap()
    }

    /// Makes every request to `collection` fail with `status` and `message`.
    pub(crate) fn fail(&self, collection: &str, status: u16, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(collection.to_string(), (status, message.to_string()));
    }

    pub(crate) fn heal(&self, collection: &str) {
        self.state.lock().unwrap().failures.remove(collection);
    }

    pub(crate) fn records(&self, collection: &str) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn requests(&self) -> Vec<Received> {
        self.state.lock().unwrap().requests.clone()
    }

    /// `METHOD /path` of every request, in arrival order.
    pub(crate) fn request_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}
