//! Request validation for the POST endpoints
//!
//! Checks run in a fixed order: method, content type, JSON body, then the
//! endpoint-specific fields.

use hyper::header::CONTENT_TYPE;
use hyper::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{FetchRequest, SubmitRequest};

/// Earliest year accepted for a query
pub const MIN_YEAR: i32 = 1900;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("method {0} not allowed")]
    InvalidMethod(Method),

    #[error("invalid content type: {0:?}")]
    InvalidContentType(Option<String>),

    #[error("malformed JSON body: {0}")]
    MalformedBody(String),

    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("no year provided")]
    MissingYear,

    #[error("invalid year: {0:?}")]
    InvalidYear(String),

    #[error("no queryid provided")]
    MissingQueryId,

    #[error("invalid queryid: {0:?}")]
    InvalidQueryId(String),
}

impl ValidationError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::MalformedBody(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidContentType(_)
            | Self::MissingYear
            | Self::InvalidYear(_)
            | Self::MissingQueryId
            | Self::InvalidQueryId(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Text sent to the client; carries no request or server detail
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidMethod(_) => "Method Not Allowed",
            Self::InvalidContentType(_) => "Invalid content type",
            Self::MalformedBody(_) => "Error parsing json",
            Self::BodyTooLarge(_) => "413 Payload Too Large",
            Self::MissingYear => "No year provided",
            Self::InvalidYear(_) => "Invalid year",
            Self::MissingQueryId => "No queryid provided",
            Self::InvalidQueryId(_) => "Invalid queryid",
        }
    }
}

/// Both POST endpoints require `POST` with `Content-Type: application/json`
pub fn check_json_post(method: &Method, headers: &HeaderMap) -> Result<(), ValidationError> {
    if method != Method::POST {
        return Err(ValidationError::InvalidMethod(method.clone()));
    }

    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if content_type != Some("application/json") {
        return Err(ValidationError::InvalidContentType(
            content_type.map(ToString::to_string),
        ));
    }
    Ok(())
}

/// Decode the first JSON value in `body` into a request type.
///
/// Object keys match field names case-insensitively, null members count as
/// absent, a top-level `null` yields the empty request and anything after the
/// first value is ignored.
fn decode_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ValidationError> {
    let malformed = |e: serde_json::Error| ValidationError::MalformedBody(e.to_string());

    let value = serde_json::Deserializer::from_slice(body)
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| ValidationError::MalformedBody("empty body".to_string()))?
        .map_err(malformed)?;

    match value {
        Value::Null => Ok(T::default()),
        Value::Object(members) => {
            serde_json::from_value(Value::Object(fold_keys(members))).map_err(malformed)
        }
        other => Err(ValidationError::MalformedBody(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Lowercase member names; an exact lowercase key wins over other spellings
fn fold_keys(members: Map<String, Value>) -> Map<String, Value> {
    let mut folded = Map::new();
    for (key, value) in members {
        if value.is_null() {
            continue;
        }
        let lower = key.to_lowercase();
        if key == lower || !folded.contains_key(&lower) {
            folded.insert(lower, value);
        }
    }
    folded
}

/// Decode a submit body and return the requested year
pub fn parse_submission(body: &[u8], current_year: i32) -> Result<i32, ValidationError> {
    let req: SubmitRequest = decode_body(body)?;

    if req.year.is_empty() {
        return Err(ValidationError::MissingYear);
    }

    match req.year.parse::<i32>() {
        Ok(year) if (MIN_YEAR..=current_year).contains(&year) => Ok(year),
        _ => Err(ValidationError::InvalidYear(req.year)),
    }
}

/// Decode a fetch body and return the requested result id
pub fn parse_fetch(body: &[u8]) -> Result<String, ValidationError> {
    let req: FetchRequest = decode_body(body)?;

    if req.query_id.is_empty() {
        return Err(ValidationError::MissingQueryId);
    }
    // ids are bare file stems inside the data directory
    if req.query_id.contains(&['/', '\\', '\0'][..]) || req.query_id.contains("..") {
        return Err(ValidationError::InvalidQueryId(req.query_id));
    }
    Ok(req.query_id)
}
