//! Minimal tus 1.0.0 server (creation, HEAD, PATCH, deferred length).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{head, post};
use resumable_protocol::constants::{OFFSET_OCTET_STREAM, TUS_VERSION, header};
use resumable_protocol::{parse_length, parse_offset};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default)]
pub struct StoredUpload {
    pub data: Vec<u8>,
    pub length: Option<u64>,
    pub metadata: Option<String>,
}

#[derive(Default)]
struct Inner {
    uploads: HashMap<String, StoredUpload>,
    next_id: u64,
    patch_failures: VecDeque<StatusCode>,
    creations: usize,
    patches: usize,
    overridden_patches: usize,
}

/// Shared server state, also used by tests to inspect and inject faults.
#[derive(Clone, Default)]
pub struct TusState {
    inner: Arc<Mutex<Inner>>,
}

impl TusState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Makes the next PATCH requests fail with `status`, one per entry.
    pub fn fail_patches(&self, statuses: &[StatusCode]) {
        self.lock().patch_failures.extend(statuses.iter().copied());
    }

    pub fn upload(&self, id: &str) -> Option<StoredUpload> {
        self.lock().uploads.get(id).cloned()
    }

    pub fn only_upload(&self) -> Option<StoredUpload> {
        let inner = self.lock();
        if inner.uploads.len() != 1 {
            return None;
        }
        inner.uploads.values().next().cloned()
    }

    pub fn creations(&self) -> usize {
        self.lock().creations
    }

    pub fn patches(&self) -> usize {
        self.lock().patches
    }

    pub fn overridden_patches(&self) -> usize {
        self.lock().overridden_patches
    }
}

pub struct TestServer {
    pub base: String,
    pub state: TusState,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Creation endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/files/", self.base)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn() -> TestServer {
    let state = TusState::default();
    let router = Router::new()
        .route("/files/", post(create))
        .route(
            "/files/{id}",
            head(status).patch(append).post(append_overridden),
        )
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    TestServer {
        base: format!("http://{addr}"),
        state,
        handle,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn tus_response(status: StatusCode, extra: &[(&'static str, String)]) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    let tus = [(header::TUS_RESUMABLE, TUS_VERSION.to_string())];
    for (name, value) in tus.iter().chain(extra) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }
    (status, headers).into_response()
}

fn version_ok(headers: &HeaderMap) -> bool {
    header_str(headers, header::TUS_RESUMABLE) == Some(TUS_VERSION)
}

async fn create(State(state): State<TusState>, headers: HeaderMap) -> Response {
    if !version_ok(&headers) {
        return tus_response(StatusCode::PRECONDITION_FAILED, &[]);
    }
    let length = match header_str(&headers, header::UPLOAD_LENGTH) {
        Some(v) => match parse_length(v) {
            Ok(n) => Some(n),
            Err(_) => return tus_response(StatusCode::BAD_REQUEST, &[]),
        },
        None if header_str(&headers, header::UPLOAD_DEFER_LENGTH) == Some("1") => None,
        None => return tus_response(StatusCode::BAD_REQUEST, &[]),
    };

    let mut inner = state.lock();
    inner.next_id += 1;
    inner.creations += 1;
    let id = inner.next_id.to_string();
    inner.uploads.insert(
        id.clone(),
        StoredUpload {
            data: Vec::new(),
            length,
            metadata: header_str(&headers, header::UPLOAD_METADATA).map(str::to_string),
        },
    );

    tus_response(
        StatusCode::CREATED,
        &[(header::LOCATION, format!("/files/{id}"))],
    )
}

async fn status(
    State(state): State<TusState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !version_ok(&headers) {
        return tus_response(StatusCode::PRECONDITION_FAILED, &[]);
    }
    let inner = state.lock();
    let Some(upload) = inner.uploads.get(&id) else {
        return tus_response(StatusCode::NOT_FOUND, &[]);
    };
    let mut extra = vec![(header::UPLOAD_OFFSET, upload.data.len().to_string())];
    match upload.length {
        Some(length) => extra.push((header::UPLOAD_LENGTH, length.to_string())),
        None => extra.push((header::UPLOAD_DEFER_LENGTH, "1".to_string())),
    }
    tus_response(StatusCode::OK, &extra)
}

async fn append_overridden(
    state: State<TusState>,
    id: Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if header_str(&headers, header::METHOD_OVERRIDE) != Some("PATCH") {
        return tus_response(StatusCode::METHOD_NOT_ALLOWED, &[]);
    }
    state.lock().overridden_patches += 1;
    append(state, id, headers, body).await
}

async fn append(
    State(state): State<TusState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut inner = state.lock();
    inner.patches += 1;
    if let Some(status) = inner.patch_failures.pop_front() {
        return tus_response(status, &[]);
    }
    if !version_ok(&headers) {
        return tus_response(StatusCode::PRECONDITION_FAILED, &[]);
    }
    if header_str(&headers, header::CONTENT_TYPE) != Some(OFFSET_OCTET_STREAM) {
        return tus_response(StatusCode::UNSUPPORTED_MEDIA_TYPE, &[]);
    }
    let Some(offset) = header_str(&headers, header::UPLOAD_OFFSET).and_then(|v| parse_offset(v).ok())
    else {
        return tus_response(StatusCode::BAD_REQUEST, &[]);
    };
    let Some(upload) = inner.uploads.get_mut(&id) else {
        return tus_response(StatusCode::NOT_FOUND, &[]);
    };
    let current = upload.data.len() as u64;
    if offset != current {
        return tus_response(
            StatusCode::CONFLICT,
            &[(header::UPLOAD_OFFSET, current.to_string())],
        );
    }
    if let Some(declared) = header_str(&headers, header::UPLOAD_LENGTH) {
        match (parse_length(declared), upload.length) {
            (Ok(n), None) => upload.length = Some(n),
            (Ok(n), Some(existing)) if n == existing => {}
            _ => return tus_response(StatusCode::BAD_REQUEST, &[]),
        }
    }
    if let Some(length) = upload.length {
        if current + body.len() as u64 > length {
            return tus_response(StatusCode::PAYLOAD_TOO_LARGE, &[]);
        }
    }

    upload.data.extend_from_slice(&body);
    tus_response(
        StatusCode::NO_CONTENT,
        &[(header::UPLOAD_OFFSET, upload.data.len().to_string())],
    )
}
