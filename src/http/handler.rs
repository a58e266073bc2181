//! Handler surface exposed to embedders.
//!
//! # Responsibilities
//! - Define the `Handler` contract invoked for every matched request
//! - Carry request metadata (method, URI, headers, peer, request ID)
//! - Buffer the response a handler writes, bounded in size
//!
//! # Design Decisions
//! - `serve_http` returns nothing: failures are the handler's to log
//! - Writes past the size limit fail rather than truncate silently

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::Response;

/// Error returned by `ResponseWriter::write`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("response body limit of {limit} bytes exceeded")]
    BodyTooLarge { limit: usize },
}

/// A failure while a handler renders its response.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("write failed: {0}")]
    Write(#[from] WriteError),
}

/// Serves requests for a registered pattern.
///
/// Called concurrently from server worker threads.
pub trait Handler: Send + Sync {
    fn serve_http(&self, writer: &mut ResponseWriter, request: &HttpRequest);
}

impl<F> Handler for F
where
    F: Fn(&mut ResponseWriter, &HttpRequest) + Send + Sync,
{
    fn serve_http(&self, writer: &mut ResponseWriter, request: &HttpRequest) {
        self(writer, request)
    }
}

/// Request metadata handed to handlers.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    remote_addr: Option<SocketAddr>,
}

impl HttpRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            method,
            uri,
            headers,
            remote_addr,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The `x-request-id` assigned by the server, if any.
    pub fn request_id(&self) -> Option<&str> {
        self.headers.get("x-request-id").and_then(|v| v.to_str().ok())
    }
}

/// Buffered response under construction.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    limit: usize,
}

impl ResponseWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            limit,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Append to the body. Nothing is written if the limit would be exceeded.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, WriteError> {
        if self.body.len() + buf.len() > self.limit {
            return Err(WriteError::BodyTooLarge { limit: self.limit });
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Finish the response, defaulting `Content-Type` from the body.
    pub fn into_response(mut self) -> Response {
        if !self.body.is_empty() && !self.headers.contains_key(header::CONTENT_TYPE) {
            self.headers
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(sniff(&self.body)));
        }

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

fn sniff(body: &[u8]) -> &'static str {
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let head = &body[start..body.len().min(start + 14)];
    let html = [b"<!doctype html".as_slice(), b"<html".as_slice()]
        .iter()
        .any(|tag| head.len() >= tag.len() && head[..tag.len()].eq_ignore_ascii_case(tag));

    if html {
        "text/html; charset=utf-8"
    } else if std::str::from_utf8(body).is_ok() {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}
