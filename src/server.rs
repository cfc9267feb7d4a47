//! server.rs
//!
//! HTTP front end: `/register`, `/search` and `/update` over an injected
//! `DataStore`, plus `/metrics` and `/healthz`. Handlers normalize input,
//! call the store and decide status codes; internal failure detail is logged
//! but never returned to the client.

use std::{convert::Infallible, future::Future, net::SocketAddr, sync::Arc, time::Instant};

use hyper::body::HttpBody;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::asset::{canonical, parse_iso_date, CryptoAsset};
use crate::metrics::{self, REQUEST_COUNTER, REQUEST_ERRORS, REQUEST_HISTOGRAM};
use crate::statement::SearchFilter;
use crate::store::DataStore;

pub const REGISTER_ENDPOINT: &str = "/register";
pub const SEARCH_ENDPOINT: &str = "/search";
pub const UPDATE_ENDPOINT: &str = "/update";

const INTERNAL_SERVER_ERROR: &str = "internal server error";
const NULL_TEAM_ERROR: &str = "team cannot be null";

/// Largest request body `/register` and `/update` will read.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve<F>(
    addr: SocketAddr,
    store: Arc<dyn DataStore>,
    shutdown: F,
) -> Result<(), hyper::Error>
where
    F: Future<Output = ()>,
{
    let make_svc = make_service_fn(move |_conn| {
        let store = store.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                handle(store.clone(), req)
            }))
        }
    });

    info!(%addr, "Starting crypto asset registry server");
    Server::try_bind(&addr)?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Route one request.
pub async fn handle(
    store: Arc<dyn DataStore>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let (endpoint, response) = match (&method, path.as_str()) {
        (&Method::POST, REGISTER_ENDPOINT) => (
            Some(REGISTER_ENDPOINT),
            register(store.as_ref(), req.into_body()).await,
        ),
        (&Method::GET, SEARCH_ENDPOINT) => (
            Some(SEARCH_ENDPOINT),
            search(store.as_ref(), req.uri().query().unwrap_or_default()).await,
        ),
        (&Method::POST, UPDATE_ENDPOINT) => (
            Some(UPDATE_ENDPOINT),
            update(store.as_ref(), req.into_body()).await,
        ),

        // ─── METRICS ENDPOINT ─────────────────────────
        (&Method::GET, "/metrics") => {
            // Prometheus rejects scrapes without the exposition MIME type.
            let encoder = TextEncoder::new();
            let mut resp = Response::new(Body::from(metrics::gather_metrics()));
            if let Ok(mime) = HeaderValue::from_str(encoder.format_type()) {
                resp.headers_mut().insert(CONTENT_TYPE, mime);
            }
            (None, resp)
        }

        // ─── HEALTHCHECK ENDPOINT ─────────────────────
        (&Method::GET, "/healthz") => (None, Response::new(Body::from("OK"))),

        // ─── ANY OTHER ROUTE ──────────────────────────
        _ => {
            let mut not_found = Response::new(Body::empty());
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            (None, not_found)
        }
    };

    if let Some(endpoint) = endpoint {
        REQUEST_COUNTER.with_label_values(&[endpoint]).inc();
        REQUEST_HISTOGRAM
            .with_label_values(&[endpoint])
            .observe(started.elapsed().as_secs_f64());
        if !response.status().is_success() {
            REQUEST_ERRORS.with_label_values(&[endpoint]).inc();
        }
    }

    Ok(response)
}

/// Create a record. The body must carry a `team`, even an empty one, so that
/// a registration with no members is always deliberate.
async fn register(store: &dyn DataStore, body: Body) -> Response<Body> {
    let mut asset = match parse_asset(body).await {
        Ok(asset) => asset,
        Err(e) => {
            error!(endpoint = REGISTER_ENDPOINT, error = %e, "unable to parse given crypto asset");
            return error_response(StatusCode::BAD_REQUEST, &e);
        }
    };

    if asset.team.is_none() {
        error!(endpoint = REGISTER_ENDPOINT, "{}", NULL_TEAM_ERROR);
        return error_response(StatusCode::BAD_REQUEST, NULL_TEAM_ERROR);
    }

    if let Err(e) = asset.normalize() {
        error!(endpoint = REGISTER_ENDPOINT, error = %e, "crypto asset normalization failed");
        return error_response(StatusCode::BAD_REQUEST, &e.to_string());
    }

    match store.insert(&asset).await {
        Ok(id) => {
            info!(endpoint = REGISTER_ENDPOINT, %id, "Registered crypto asset");
            json_response(StatusCode::OK, &json!({ "id": id }))
        }
        Err(e) => {
            error!(endpoint = REGISTER_ENDPOINT, error = %e, "could not insert the crypto asset");
            if e.is_caller_fixable() {
                error_response(StatusCode::BAD_REQUEST, &e.to_string())
            } else {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
            }
        }
    }
}

async fn search(store: &dyn DataStore, query: &str) -> Response<Body> {
    let filter = parse_search_query(query);

    match store.select(&filter).await {
        Ok(mut assets) => {
            for asset in assets.iter_mut() {
                asset.format();
            }
            json_response(StatusCode::OK, &assets)
        }
        Err(e) => {
            error!(endpoint = SEARCH_ENDPOINT, error = %e, "error performing select query");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_SERVER_ERROR)
        }
    }
}

/// Apply a sparse update. Answers with a bare JSON boolean.
async fn update(store: &dyn DataStore, body: Body) -> Response<Body> {
    let mut asset = match parse_asset(body).await {
        Ok(asset) => asset,
        Err(e) => {
            error!(endpoint = UPDATE_ENDPOINT, error = %e, "unable to parse given crypto asset");
            return json_response(StatusCode::BAD_REQUEST, &false);
        }
    };

    if asset.id.is_none() {
        error!(endpoint = UPDATE_ENDPOINT, "no id in update request");
        return json_response(StatusCode::BAD_REQUEST, &false);
    }

    let id = match asset.normalize() {
        Ok(id) => id,
        Err(e) => {
            error!(endpoint = UPDATE_ENDPOINT, error = %e, "crypto asset normalization failed");
            return json_response(StatusCode::BAD_REQUEST, &false);
        }
    };

    match store.update(id, &asset).await {
        Ok(()) => {
            info!(endpoint = UPDATE_ENDPOINT, id, "Updated crypto asset");
            json_response(StatusCode::OK, &true)
        }
        Err(e) => {
            error!(endpoint = UPDATE_ENDPOINT, id, error = %e, "could not update the crypto asset");
            let status = if e.is_caller_fixable() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            json_response(status, &false)
        }
    }
}

async fn parse_asset(body: Body) -> Result<CryptoAsset, String> {
    let bytes = read_limited(body, MAX_BODY_BYTES).await?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

/// Collect `body`, giving up as soon as it is known to exceed `limit` bytes.
async fn read_limited(mut body: Body, limit: usize) -> Result<Vec<u8>, String> {
    let too_large = || format!("request body exceeds {limit} bytes");

    // A declared Content-Length is the exact lower bound.
    if body.size_hint().lower() > limit as u64 {
        return Err(too_large());
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        if bytes.len() + chunk.len() > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Build a search filter from a query string.
///
/// `name`, `symbol`, `fundingStatus` and `coinType` may repeat and may hold
/// comma separated values; each value is canonicalized and blanks are
/// dropped. `startDate`/`endDate` use the first value of their first
/// occurrence and are ignored unless it is a `YYYY-MM-DD` date.
pub fn parse_search_query(query: &str) -> SearchFilter {
    let mut filter = SearchFilter::default();

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let set = match key.as_ref() {
            "name" => &mut filter.names,
            "symbol" => &mut filter.symbols,
            "fundingStatus" => &mut filter.funding_statuses,
            "coinType" => &mut filter.coin_types,
            "startDate" => {
                if filter.start_date.is_none() {
                    filter.start_date = Some(first_date(&value));
                }
                continue;
            }
            "endDate" => {
                if filter.end_date.is_none() {
                    filter.end_date = Some(first_date(&value));
                }
                continue;
            }
            _ => continue,
        };
        set.extend(
            value
                .split(',')
                .map(canonical)
                .filter(|v| !v.is_empty()),
        );
    }

    // A bound that failed to parse is recorded as empty so a later
    // occurrence can't replace it; drop it now.
    filter.start_date = filter.start_date.filter(|d| !d.is_empty());
    filter.end_date = filter.end_date.filter(|d| !d.is_empty());
    filter
}

fn first_date(value: &str) -> String {
    let first = value.split(',').next().unwrap_or_default();
    match parse_iso_date(first) {
        Some(_) => first.to_string(),
        None => String::new(),
    }
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Body> {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "failed to serialize response body");
            let mut resp = Response::new(Body::empty());
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return resp;
        }
    };
    let mut resp = Response::new(Body::from(bytes));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, &json!({ "error": message }))
}
