//! DNS over HTTPS (RFC 8484) request handling as an axum router.
//!
//! The router answers on the configured path and everything below it;
//! TLS termination and the accept loop live with the binary.

use super::{exchange_in_buffer, Stage};
use crate::dns::buffer_pool::{BufferPool, PooledBuffer, MAX_MESSAGE_SIZE};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, Engine};
use dnsmux_application::ports::Upstream;
use dnsmux_domain::DomainError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

const TRANSPORT: &str = "https";

/// RFC 8484 says unpadded base64url; padded input is tolerated.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Clone)]
pub struct DohState {
    pub upstream: Arc<dyn Upstream>,
    pub pool: BufferPool,
}

#[derive(Debug, Deserialize)]
pub struct DohParams {
    dns: Option<String>,
}

/// Serves `path` as a prefix: `/dns-query`, `/dns-query/` and
/// `/dns-query/anything` all reach the same handlers.
pub fn doh_router(path: &str, state: DohState) -> Router {
    let handlers = get(serve_get).post(serve_post);
    let base = path.trim_end_matches('/');
    let with_slash = format!("{}/", base);

    let mut router = Router::new().route(path, handlers.clone());
    if with_slash != path {
        router = router.route(&with_slash, handlers.clone());
    }
    router
        .route(&format!("{}/{{*rest}}", base), handlers)
        .with_state(state)
}

async fn serve_get(
    State(state): State<DohState>,
    Query(params): Query<DohParams>,
) -> Result<Response, DohError> {
    let encoded = params
        .dns
        .ok_or_else(|| DohError::bad_request("missing dns query parameter"))?;

    let mut buffer = state.pool.acquire();
    let len = BASE64_URL
        .decode_slice(encoded.as_bytes(), buffer.read_region())
        .map_err(|e| match e {
            base64::DecodeSliceError::OutputSliceTooSmall => DohError::too_large(),
            base64::DecodeSliceError::DecodeError(e) => {
                DohError::bad_request(format!("invalid base64url: {}", e))
            }
        })?;

    answer(&state, &mut buffer, len).await
}

async fn serve_post(State(state): State<DohState>, body: Bytes) -> Result<Response, DohError> {
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(DohError::too_large());
    }

    let mut buffer = state.pool.acquire();
    let len = buffer
        .fill_from(&body)
        .map_err(|_| DohError::too_large())?;

    answer(&state, &mut buffer, len).await
}

async fn answer(
    state: &DohState,
    buffer: &mut PooledBuffer,
    len: usize,
) -> Result<Response, DohError> {
    let response_len = exchange_in_buffer(state.upstream.as_ref(), buffer, len)
        .await
        .map_err(|(stage, e)| DohError::Exchange(stage, e))?;

    Ok((
        [(header::CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)],
        buffer[..response_len].to_vec(),
    )
        .into_response())
}

pub enum DohError {
    BadRequest(String),
    TooLarge,
    Exchange(Stage, DomainError),
}

impl DohError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn too_large() -> Self {
        Self::TooLarge
    }
}

impl IntoResponse for DohError {
    fn into_response(self) -> Response {
        match self {
            DohError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            DohError::TooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("DNS message exceeds {} bytes", MAX_MESSAGE_SIZE),
            )
                .into_response(),
            DohError::Exchange(Stage::Decode, e) => {
                (StatusCode::BAD_REQUEST, e.to_string()).into_response()
            }
            DohError::Exchange(stage, e) => {
                error!(transport = TRANSPORT, %stage, error = %e, "DNS request failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
