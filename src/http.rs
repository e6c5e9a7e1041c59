//! HTTP front-end: thin adapter mapping `POST /v1/keys/{key}` to append and
//! `GET /v1/keys/{key}` to read-all. Specified here only as the contract
//! the store façade exposes — the actual request/response plumbing is an
//! external collaborator to the durability core.

use std::convert::Infallible;
use std::sync::Arc;

use log::error;
use serde::Serialize;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::error::AstoreError;
use crate::store::Store;

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u32,
    #[serde(rename = "errorMessage")]
    error_message: String,
}

#[derive(Serialize)]
struct OkBody {
    status: &'static str,
}

/// Maps an [`AstoreError`] to its documented HTTP status and error-code
/// body. Error codes form a closed set starting at 1000, in the order
/// `EmptyBody, InvalidMethod, InvalidContentType, NotFound, MissingKey,
/// StoreIo`.
fn error_response(err: &AstoreError) -> (StatusCode, ErrorBody) {
    let (status, code) = match err {
        AstoreError::EmptyBody => (StatusCode::BAD_REQUEST, 1000),
        AstoreError::InvalidMethod => (StatusCode::BAD_REQUEST, 1001),
        AstoreError::InvalidContentType => (StatusCode::BAD_REQUEST, 1002),
        AstoreError::NotFound => (StatusCode::NOT_FOUND, 1003),
        AstoreError::MissingKey => (StatusCode::BAD_REQUEST, 1004),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, 1005),
    };
    (
        status,
        ErrorBody {
            error_code: code,
            error_message: err.to_string(),
        },
    )
}

fn error_reply(err: AstoreError) -> warp::reply::WithStatus<warp::reply::Json> {
    let (status, body) = error_response(&err);
    warp::reply::with_status(warp::reply::json(&body), status)
}

/// Builds the full set of routes over `store`.
pub fn routes(store: Arc<Store>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let with_store = warp::any().map(move || store.clone());

    let post_key = warp::path!("v1" / "keys" / String)
        .and(warp::post())
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::bytes())
        .and(with_store.clone())
        .and_then(handle_post);

    let get_key = warp::path!("v1" / "keys" / String)
        .and(warp::get())
        .and(with_store.clone())
        .and_then(handle_get);

    // A request to `/v1/keys/{key}` that is neither GET nor POST falls
    // through both method-gated filters above on a rejection; this
    // path-only filter catches it before the blanket 404 below.
    let invalid_method = warp::path!("v1" / "keys" / String)
        .map(|_key: String| error_reply(AstoreError::InvalidMethod));

    let not_found = warp::any().map(|| error_reply(AstoreError::NotFound));

    post_key.or(get_key).or(invalid_method).or(not_found)
}

async fn handle_post(
    key: String,
    content_type: Option<String>,
    body: bytes::Bytes,
    store: Arc<Store>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    if key.is_empty() {
        return Ok(error_reply(AstoreError::MissingKey));
    }
    if !matches!(content_type.as_deref(), Some(ct) if ct.starts_with("application/json")) {
        return Ok(error_reply(AstoreError::InvalidContentType));
    }
    if body.is_empty() {
        return Ok(error_reply(AstoreError::EmptyBody));
    }

    let payload = body.to_vec();
    let result = tokio::task::spawn_blocking(move || store.write_to_key(&key, &payload))
        .await
        .expect("store write task panicked");

    match result {
        Ok(()) => Ok(warp::reply::with_status(
            warp::reply::json(&OkBody { status: "ok" }),
            StatusCode::OK,
        )),
        Err(e) => {
            error!("POST /v1/keys failed: {e}");
            Ok(error_reply(e))
        }
    }
}

/// Streams the raw, decompressed bytes of every record stored under `key`,
/// comma-separated and wrapped in `[` `]` — no JSON parse/re-encode of the
/// record bytes themselves, so a record's byte-for-byte contents (and any
/// object key order within it) survive untouched.
async fn handle_get(key: String, store: Arc<Store>) -> Result<warp::reply::Response, Infallible> {
    if key.is_empty() {
        return Ok(error_reply(AstoreError::MissingKey).into_response());
    }

    let result = tokio::task::spawn_blocking(move || -> crate::Result<Vec<u8>> {
        let mut body = vec![b'['];
        let mut first = true;
        store.read_each_from_key(&key, |r| {
            if !first {
                body.push(b',');
            }
            first = false;
            std::io::Read::read_to_end(r, &mut body)?;
            Ok(())
        })?;
        body.push(b']');
        Ok(body)
    })
    .await
    .expect("store read task panicked");

    match result {
        Ok(body) => Ok(warp::http::Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(hyper::Body::from(body))
            .expect("building the read-all response cannot fail")),
        Err(e) => {
            error!("GET /v1/keys failed: {e}");
            Ok(error_reply(e).into_response())
        }
    }
}
