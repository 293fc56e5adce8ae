//! In-memory tus server for engine tests.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use reqwest::{Method, Url};
use resumable_protocol::constants::{OFFSET_OCTET_STREAM, TUS_VERSION, header};
use resumable_protocol::{parse_length, parse_offset};

use crate::error::TransportError;
use crate::transport::{Request, Response, Transport};

pub(crate) const ENDPOINT: &str = "http://tus.test/files/";

pub(crate) fn endpoint() -> Url {
    Url::parse(ENDPOINT).unwrap()
}

/// Misbehaviour injected into the next matching request.
#[derive(Debug, Clone)]
pub(crate) enum Fault {
    /// Answer with this status and change nothing.
    Status(u16),
    /// Fail the exchange at the transport level.
    Disconnect,
    /// Accept the body but report this offset.
    ReportOffset(u64),
    /// Answer creation with a 201 that has no `Location`.
    NoLocation,
    /// Answer creation with a 201 whose `Location` is blank.
    EmptyLocation,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Resource {
    pub data: Vec<u8>,
    pub length: Option<u64>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body_len: usize,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct State {
    resources: HashMap<String, Resource>,
    next_id: u32,
    log: Vec<Recorded>,
    faults: VecDeque<(Method, Fault)>,
    patch_budget: Option<usize>,
}

#[derive(Default)]
pub(crate) struct MockTus {
    state: Mutex<State>,
}

impl MockTus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn fail_next(&self, method: Method, fault: Fault) {
        self.state().faults.push_back((method, fault));
    }

    /// Lets `ok` more PATCH requests through, then disconnects every
    /// following one.
    pub fn fail_patches_after(&self, ok: usize) {
        self.state().patch_budget = Some(ok);
    }

    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.faults.clear();
        state.patch_budget = None;
    }

    pub fn resource(&self, url: &Url) -> Option<Resource> {
        self.state().resources.get(url.as_str()).cloned()
    }

    pub fn insert_resource(&self, url: &str, resource: Resource) {
        self.state().resources.insert(url.to_string(), resource);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state().log.clone()
    }

    pub fn count(&self, method: Method) -> usize {
        self.state()
            .log
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    /// Total body bytes carried by PATCH requests.
    pub fn patch_bytes(&self) -> usize {
        self.state()
            .log
            .iter()
            .filter(|r| r.method == Method::PATCH)
            .map(|r| r.body_len)
            .sum()
    }

    fn handle(&self, request: Request) -> Result<Response, TransportError> {
        let mut state = self.state();

        let overridden = request.method == Method::POST
            && request.header(header::METHOD_OVERRIDE) == Some("PATCH");
        let method = if overridden {
            Method::PATCH
        } else {
            request.method.clone()
        };
        state.log.push(Recorded {
            method: method.clone(),
            url: request.url.to_string(),
            headers: request.headers.clone(),
            body_len: request.body.len(),
        });

        if method == Method::PATCH {
            if let Some(budget) = state.patch_budget.as_mut() {
                if *budget == 0 {
                    return Err(TransportError::Connection("connection reset".into()));
                }
                *budget -= 1;
            }
        }

        let fault = state
            .faults
            .iter()
            .position(|(m, _)| *m == method)
            .and_then(|i| state.faults.remove(i))
            .map(|(_, f)| f);

        match fault {
            Some(Fault::Status(status)) => return Ok(Response::new(status)),
            Some(Fault::Disconnect) => {
                return Err(TransportError::Connection("connection reset".into()));
            }
            _ => {}
        }

        if request.header(header::TUS_RESUMABLE) != Some(TUS_VERSION) {
            return Ok(Response::new(412));
        }

        let response = if method == Method::POST {
            create(&mut state, &request, fault)
        } else if method == Method::HEAD {
            status(&state, &request)
        } else if method == Method::PATCH {
            append(&mut state, &request, fault)
        } else {
            Response::new(405)
        };
        Ok(response.with_header(header::TUS_RESUMABLE, TUS_VERSION))
    }
}

fn create(state: &mut State, request: &Request, fault: Option<Fault>) -> Response {
    let length = match request.header(header::UPLOAD_LENGTH) {
        Some(v) => match parse_length(v) {
            Ok(n) => Some(n),
            Err(_) => return Response::new(400),
        },
        None if request.header(header::UPLOAD_DEFER_LENGTH) == Some("1") => None,
        None => return Response::new(400),
    };

    state.next_id += 1;
    let id = state.next_id;
    let url = format!("{ENDPOINT}{id}");
    state.resources.insert(
        url,
        Resource {
            data: Vec::new(),
            length,
            metadata: request.header(header::UPLOAD_METADATA).map(str::to_string),
        },
    );

    let response = Response::new(201);
    match fault {
        Some(Fault::NoLocation) => return response,
        Some(Fault::EmptyLocation) => return response.with_header(header::LOCATION, "  "),
        _ => {}
    }
    // Relative on purpose: the client must resolve it.
    response.with_header(header::LOCATION, format!("/files/{id}"))
}

fn status(state: &State, request: &Request) -> Response {
    let Some(resource) = state.resources.get(request.url.as_str()) else {
        return Response::new(404);
    };
    let mut response =
        Response::new(200).with_header(header::UPLOAD_OFFSET, resource.data.len().to_string());
    if let Some(length) = resource.length {
        response = response.with_header(header::UPLOAD_LENGTH, length.to_string());
    } else {
        response = response.with_header(header::UPLOAD_DEFER_LENGTH, "1");
    }
    response
}

fn append(state: &mut State, request: &Request, fault: Option<Fault>) -> Response {
    let Some(resource) = state.resources.get_mut(request.url.as_str()) else {
        return Response::new(404);
    };
    if request.header(header::CONTENT_TYPE) != Some(OFFSET_OCTET_STREAM) {
        return Response::new(415);
    }
    let Some(offset) = request
        .header(header::UPLOAD_OFFSET)
        .and_then(|v| parse_offset(v).ok())
    else {
        return Response::new(400);
    };
    if offset != resource.data.len() as u64 {
        return Response::new(409)
            .with_header(header::UPLOAD_OFFSET, resource.data.len().to_string());
    }
    if let Some(declared) = request.header(header::UPLOAD_LENGTH) {
        let Ok(declared) = parse_length(declared) else {
            return Response::new(400);
        };
        match resource.length {
            Some(existing) if existing != declared => return Response::new(400),
            _ => resource.length = Some(declared),
        }
    }
    let new_len = resource.data.len() + request.body.len();
    if let Some(length) = resource.length {
        if new_len as u64 > length {
            return Response::new(413);
        }
    }

    if let Some(Fault::ReportOffset(reported)) = fault {
        resource.data.extend_from_slice(&request.body);
        return Response::new(204).with_header(header::UPLOAD_OFFSET, reported.to_string());
    }

    resource.data.extend_from_slice(&request.body);
    Response::new(204).with_header(header::UPLOAD_OFFSET, resource.data.len().to_string())
}

impl Transport for MockTus {
    fn send(
        &self,
        request: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, TransportError>> + Send + '_>> {
        Box::pin(async move { self.handle(request) })
    }
}
