//! Request middleware: response headers, statistics, media type and auth checks

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::server::state::ServerState;
use crate::utils::generate_uuid;

pub const INVALID_MEDIA_TYPE: &str = "Invalid Content-Type or Accept header value.";
pub const INVALID_AUTHORIZATION: &str = "Invalid authorization.";

/// Statistics bucket shared by every request that matched no route
pub const UNMATCHED_ROUTE: &str = "(unmatched)";

const JSON: &str = "application/json";
const JSON_UTF8: &str = "application/json;charset=utf-8";

/// Identifier assigned to each request, echoed in `X-Request-ID`
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Tag every request with an id, count it and decorate the response headers
pub async fn common_headers(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = generate_uuid();
    let bytes = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ROUTE, MatchedPath::as_str)
        .to_string();
    state.stats.record(&route, bytes);
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with(JSON));
    if is_json {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert("x-request-id", value);
    }
    if !state.server_name.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&state.server_name) {
            headers.insert(header::SERVER, value);
        }
    }
    response
}

fn header_is(request: &Request, name: header::HeaderName, expected: &str) -> bool {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected)
}

/// Require JSON content negotiation and a valid bearer token
pub async fn require_api_client(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    if !header_is(&request, header::CONTENT_TYPE, JSON) || !header_is(&request, header::ACCEPT, JSON)
    {
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, INVALID_MEDIA_TYPE).into_response();
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.replace("Bearer ", ""))
        .unwrap_or_default();
    if !state.valid_token(&token) {
        debug!("rejected token for {}", request.uri().path());
        return (StatusCode::UNAUTHORIZED, INVALID_AUTHORIZATION).into_response();
    }

    next.run(request).await
}
