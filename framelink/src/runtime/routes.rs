use std::borrow::Cow;
use std::fs;
use std::io;
use std::num::IntErrorKind;

use log::{debug, warn};

use super::capture::{
    CaptureParams, DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH,
    DEFAULT_FRAME_DELAY,
};
use super::dispatcher::{Dispatcher, Landing};
use crate::error::RemoteError;

pub const DEFAULT_LOG_LENGTH: usize = 100;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";
pub const IMAGE_PNG: &str = "image/png";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }

    pub fn text(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT_PLAIN,
            body: message.into().into_bytes(),
        }
    }

    pub fn error(err: &RemoteError) -> Self {
        Self::text(err.http_status(), err.to_string())
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Handles one request independently of the transport. `url` is the raw
/// request target including any query string.
pub fn handle(
    dispatcher: &Dispatcher,
    method: &str,
    url: &str,
    body: &[u8],
) -> ApiResponse {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let is_get = method.eq_ignore_ascii_case("GET");
    let is_post = method.eq_ignore_ascii_case("POST");

    debug!("{} {}", method, url);

    let result = match path {
        "/" if is_get => Ok(landing(dispatcher)),
        "/log" if is_get => recent_logs(dispatcher, query),
        "/capture" if is_get => capture(dispatcher, query),
        "/run-js" if is_post => Ok(run_script(dispatcher, body)),
        "/" | "/log" | "/capture" | "/run-js" => {
            return ApiResponse::text(
                405,
                format!("method {} not allowed for {}", method, path),
            );
        }
        _ => return ApiResponse::text(404, format!("not found: {}", path)),
    };

    result.unwrap_or_else(|err| {
        if err.http_status() >= 500 {
            warn!("{} {} failed: {}", method, path, err);
        }
        ApiResponse::error(&err)
    })
}

fn landing(dispatcher: &Dispatcher) -> ApiResponse {
    match dispatcher.serve_landing() {
        Landing::Status(message) => ApiResponse::ok(TEXT_PLAIN, message),
        Landing::Page(path) => match fs::read(&path) {
            Ok(contents) => ApiResponse::ok(TEXT_HTML, contents),
            Err(err) => {
                warn!("Failed to read page {}: {}", path.display(), err);
                ApiResponse::text(
                    404,
                    format!("page {} not available", path.display()),
                )
            }
        },
    }
}

fn recent_logs(
    dispatcher: &Dispatcher,
    query: &str,
) -> Result<ApiResponse, RemoteError> {
    let length = int_param(query, "length", DEFAULT_LOG_LENGTH as i64)?;
    let lines = dispatcher.get_recent_logs(length.max(0) as usize);
    let json = serde_json::to_vec(&lines).map_err(io::Error::from)?;
    Ok(ApiResponse::ok(APPLICATION_JSON, json))
}

fn capture(
    dispatcher: &Dispatcher,
    query: &str,
) -> Result<ApiResponse, RemoteError> {
    let params = CaptureParams::clamped(
        int_param(query, "width", i64::from(DEFAULT_CAPTURE_WIDTH))?,
        int_param(query, "height", i64::from(DEFAULT_CAPTURE_HEIGHT))?,
        int_param(query, "delay", i64::from(DEFAULT_FRAME_DELAY))?,
        query_value(query, "gui").as_deref() == Some("true"),
    );
    let png = dispatcher.capture_frame(params)?;
    Ok(ApiResponse::ok(IMAGE_PNG, png))
}

fn run_script(dispatcher: &Dispatcher, body: &[u8]) -> ApiResponse {
    dispatcher.submit_script(String::from_utf8_lossy(body));
    ApiResponse::ok(TEXT_PLAIN, "Done")
}

fn query_value(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn int_param(
    query: &str,
    name: &'static str,
    default: i64,
) -> Result<i64, RemoteError> {
    match query_value(query, name) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(value) => Ok(value),
            // Too large to represent is still out of range; callers clamp.
            Err(err) if *err.kind() == IntErrorKind::PosOverflow => {
                Ok(i64::MAX)
            }
            Err(err) if *err.kind() == IntErrorKind::NegOverflow => {
                Ok(i64::MIN)
            }
            Err(err) => Err(RemoteError::InvalidParameter {
                name,
                reason: format!("'{}': {}", raw, err),
            }),
        },
    }
}
