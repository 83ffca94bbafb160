use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Correlation header shared with the host; an incoming value is reused so
/// host and sidecar logs line up.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    fn from_request(request: &Request<Body>) -> Self {
        let request_id = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN)
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        Self { request_id }
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::from_request(&request);
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Log every failed request with the [`ErrorReport`] its handler attached.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = "sponsorship::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms,
            request_id,
            "request served",
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    log_failure(
        &FailedRequest {
            status,
            method: &method,
            uri: &uri,
            request_id: &request_id,
            elapsed_ms,
        },
        report,
    );
    response
}

struct FailedRequest<'a> {
    status: StatusCode,
    method: &'a Method,
    uri: &'a Uri,
    request_id: &'a str,
    elapsed_ms: u128,
}

fn log_failure(failed: &FailedRequest<'_>, report: Option<ErrorReport>) {
    let (source, messages) = report.map_or(("unknown", Vec::new()), |report| {
        (report.source, report.messages)
    });
    let detail = messages
        .first()
        .map_or("no diagnostic available", String::as_str);

    if failed.status.is_server_error() {
        error!(
            target = "sponsorship::http::response",
            status = failed.status.as_u16(),
            method = %failed.method,
            path = %failed.uri.path(),
            query = failed.uri.query().unwrap_or(""),
            elapsed_ms = failed.elapsed_ms,
            source,
            detail,
            chain = ?messages,
            request_id = failed.request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "sponsorship::http::response",
            status = failed.status.as_u16(),
            method = %failed.method,
            path = %failed.uri.path(),
            query = failed.uri.query().unwrap_or(""),
            elapsed_ms = failed.elapsed_ms,
            source,
            detail,
            chain = ?messages,
            request_id = failed.request_id,
            "client request error",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incoming_request_id_is_reused() {
        let request = Request::builder()
            .header("x-request-id", " host-abc-123 ")
            .body(Body::empty())
            .expect("request");
        assert_eq!(
            RequestContext::from_request(&request).request_id,
            "host-abc-123"
        );
    }

    #[test]
    fn oversized_request_id_is_replaced() {
        let request = Request::builder()
            .header("x-request-id", "x".repeat(MAX_REQUEST_ID_LEN + 1))
            .body(Body::empty())
            .expect("request");
        let ctx = RequestContext::from_request(&request);
        assert!(Uuid::parse_str(&ctx.request_id).is_ok());
    }
}
