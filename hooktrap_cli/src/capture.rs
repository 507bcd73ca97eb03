//! Capture endpoint: accepts any request on any path, replies `200 OK`
//! immediately and runs the inspection pipeline in the background.

use crate::output::OutputSink;
use crate::render::{self, VerifySection};
use crate::savefile;
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
    Router,
};
use chrono::{DateTime, Local, Utc};
use hooktrap_core::decode::{decode_body, DecodeError, DecodedBody};
use hooktrap_core::verify::{self, HmacCheck};
use hooktrap_core::{CapturedRequest, FileAttachment, Store};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Verification and persistence settings for the capture endpoint.
#[derive(Debug, Clone, Default)]
pub struct CaptureConfig {
    pub hmac_secret: Option<String>,
    pub hmac_header_name: Option<String>,
    pub secret_token: Option<String>,
    pub secret_token_header_name: Option<String>,
    pub save_raw_request: bool,
    pub save_format: String,
}

pub struct CaptureState {
    pub store: Arc<Store>,
    pub sink: Arc<OutputSink>,
    pub config: CaptureConfig,
}

pub fn router(state: Arc<CaptureState>) -> Router {
    Router::new().fallback(handle_capture).with_state(state)
}

/// Everything the background pipeline needs, detached from the
/// connection so the response can go out first.
struct CaptureJob {
    state: Arc<CaptureState>,
    time: DateTime<Utc>,
    method: String,
    url: String,
    proto: String,
    host: String,
    headers: BTreeMap<String, String>,
    content_type: String,
    body: Bytes,
    has_body: bool,
    read_error: Option<String>,
    signature: Option<String>,
    token_value: Option<String>,
    save_path: Option<PathBuf>,
}

async fn handle_capture(State(state): State<Arc<CaptureState>>, request: Request) -> Response {
    let time = Utc::now();
    let (parts, body) = request.into_parts();

    let has_body = matches!(parts.method, Method::POST | Method::PUT | Method::PATCH);
    let (body, read_error) = if has_body {
        match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => (bytes, None),
            Err(e) => (Bytes::new(), Some(e.to_string())),
        }
    } else {
        (Bytes::new(), None)
    };

    let url = parts.uri.to_string();
    let host = header_value(&parts.headers, header::HOST.as_str());
    let content_type = header_value(&parts.headers, header::CONTENT_TYPE.as_str());
    let signature = state
        .config
        .hmac_header_name
        .as_deref()
        .map(|name| header_value(&parts.headers, name));
    let token_value = state
        .config
        .secret_token_header_name
        .as_deref()
        .map(|name| header_value(&parts.headers, name));

    let save_path = if state.config.save_raw_request {
        savefile::formatted_filename(&state.config.save_format, &host, &url, &Local::now())
    } else {
        None
    };

    let mut reply = String::from("OK\n");
    if let Some(path) = state.sink.path() {
        reply.push_str(&format!("to see the result, run\ntail -f {}\n", path.display()));
    }
    if let Some(path) = &save_path {
        reply.push_str(&format!("Raw HTTP Request is saved to: {}\n", path.display()));
    }

    let job = CaptureJob {
        state: state.clone(),
        time,
        method: parts.method.to_string(),
        url,
        proto: format!("{:?}", parts.version),
        host,
        headers: normalize_headers(&parts.headers),
        content_type,
        body,
        has_body,
        read_error,
        signature,
        token_value,
        save_path,
    };

    // The caller is not kept waiting on rendering, disk IO or fan-out.
    tokio::spawn(process_capture(job));

    ([(header::CONTENT_TYPE, "text/plain")], reply).into_response()
}

async fn process_capture(job: CaptureJob) {
    let config = &job.state.config;

    // A failed body read leaves nothing trustworthy to verify against.
    let verifiable = job.has_body && job.read_error.is_none();
    let (token_matches, hmac_check) = run_verification(
        config,
        &job.body,
        verifiable,
        job.token_value.as_deref(),
        job.signature.as_deref(),
    );

    let decoded: Option<Result<DecodedBody, DecodeError>> =
        if job.has_body && job.read_error.is_none() {
            Some(decode_body(&job.content_type, job.body.clone()).await)
        } else {
            None
        };
    if let Some(Err(e)) = &decoded {
        tracing::debug!(url = %job.url, "body decode failed: {e}");
    }

    let files: Vec<FileAttachment> = match &decoded {
        Some(Ok(DecodedBody::Multipart { files, .. })) => files
            .iter()
            .cloned()
            .map(|part| part.into_attachment())
            .collect(),
        _ => Vec::new(),
    };

    let record = CapturedRequest {
        id: String::new(),
        time: job.time,
        method: job.method.clone(),
        url: job.url.clone(),
        headers: job.headers.clone(),
        body: String::from_utf8_lossy(&job.body).into_owned(),
        host: job.host.clone(),
        proto: job.proto.clone(),
        files,
    };

    let verify_section = VerifySection {
        secret_token: config.secret_token.as_deref().filter(|_| verifiable),
        secret_token_header: config
            .secret_token_header_name
            .as_deref()
            .filter(|_| verifiable),
        token_matches,
        hmac_secret: config.hmac_secret.as_deref().filter(|_| verifiable),
        hmac_header: config.hmac_header_name.as_deref().filter(|_| verifiable),
        hmac: hmac_check.as_ref(),
    };

    let table = render::render_capture(
        &record,
        &job.content_type,
        decoded.as_ref(),
        job.read_error.as_deref(),
        &verify_section,
    );
    let raw = render::render_raw_request(&record, &job.content_type);

    let div = render::divider();
    let block = format!("{div}\n{table}\n{div}\nRaw Http Request\n{div}\n{raw}{div}\n");
    job.state.sink.write_block(&block).await;

    if let Some(path) = &job.save_path {
        if let Err(e) = tokio::fs::write(path, &raw).await {
            tracing::warn!("failed to save raw request to {}: {e}", path.display());
        }
    }

    job.state.store.add(record).await;
}

/// Token and HMAC checks, each only when its secret and header name
/// are configured. `verifiable` is false for body-less methods and for
/// requests whose body read failed; nothing is checked then.
fn run_verification(
    config: &CaptureConfig,
    body: &[u8],
    verifiable: bool,
    token_value: Option<&str>,
    signature: Option<&str>,
) -> (Option<bool>, Option<HmacCheck>) {
    if !verifiable {
        return (None, None);
    }

    let token_matches = match (&config.secret_token, token_value) {
        (Some(expected), Some(provided)) => Some(verify::verify_token(expected, provided)),
        _ => None,
    };
    let hmac_check = match (&config.hmac_secret, signature) {
        (Some(secret), Some(signature)) => Some(verify::verify_hmac(secret, body, signature)),
        _ => None,
    };
    (token_matches, hmac_check)
}

/// All values of `name`, joined with `,` for repeated headers. Empty
/// string when absent, matching the literal-comparison semantics of
/// the token check.
fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Canonical-cased header map with repeated values merged. Sorted map
/// keeps rendering deterministic.
pub fn normalize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let key = canonical_case(name.as_str());
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(key)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

/// `content-type` -> `Content-Type`.
fn canonical_case(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
