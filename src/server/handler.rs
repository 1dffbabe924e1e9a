//! Request routing for storage node endpoints

use crate::protocol::http::{self, HttpError, Request, Response};
use crate::protocol::pairs;
use crate::store::Store;
use std::sync::Arc;
use tokio::net::TcpStream;
use tracing::error;

/// Read one request, route it, write the response, close.
pub async fn handle_connection(
    mut stream: TcpStream,
    store: Arc<Store>,
) -> Result<(), HttpError> {
    let request = match http::read_request(&mut stream).await {
        Ok(request) => request,
        Err(HttpError::Io(err)) => return Err(HttpError::Io(err)),
        Err(_) => {
            http::write_response(&mut stream, &Response::text(400, "Bad Request")).await?;
            return Ok(());
        }
    };

    let response = route(&request, &store).await;
    http::write_response(&mut stream, &response).await
}

async fn route(request: &Request, store: &Store) -> Response {
    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/put") => put(request, store).await,
        ("POST", "/del") => del(request, store).await,
        ("GET", "/get") => get(request, store).await,
        ("GET", "/range") => range(request, store).await,
        ("GET", "/all") => all(store).await,
        ("GET", "/status") => Response::ok("OK"),
        ("POST", "/reset") => reset(store).await,
        ("GET", "/stats") => stats(store).await,
        _ => Response::not_found(),
    }
}

/// Keys are single whitespace-free tokens so WAL replay can tokenize them.
fn valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(char::is_whitespace)
}

/// Values may contain spaces but never newlines (line-oriented WAL and wire).
fn valid_value(value: &str) -> bool {
    !value.contains('\n') && !value.contains('\r')
}

async fn put(request: &Request, store: &Store) -> Response {
    let key = match request.param("key") {
        Some(key) if valid_key(key) => key,
        _ => return Response::text(400, "Bad Request: invalid key"),
    };
    let value = match request.param("val") {
        Some(value) if valid_value(value) => value,
        _ => return Response::text(400, "Bad Request: invalid value"),
    };

    match store.put(key, value).await {
        Ok(()) => Response::ok("OK"),
        Err(err) => {
            error!(key = %key, error = %err, "put failed");
            Response::text(500, "Internal Server Error")
        }
    }
}

async fn del(request: &Request, store: &Store) -> Response {
    let key = match request.param("key") {
        Some(key) if valid_key(key) => key,
        _ => return Response::text(400, "Bad Request: invalid key"),
    };

    match store.delete(key).await {
        Ok(()) => Response::ok("OK"),
        Err(err) => {
            error!(key = %key, error = %err, "del failed");
            Response::text(500, "Internal Server Error")
        }
    }
}

async fn get(request: &Request, store: &Store) -> Response {
    let key = match request.param("key") {
        Some(key) if !key.is_empty() => key,
        _ => return Response::text(400, "Bad Request: invalid key"),
    };

    match store.get(key).await {
        Some(value) => Response::ok(value),
        None => Response::not_found(),
    }
}

async fn range(request: &Request, store: &Store) -> Response {
    let start: u64 = match request.param("start").map(str::parse) {
        Some(Ok(start)) => start,
        _ => return Response::text(400, "Bad Request: invalid start"),
    };
    let end: u64 = match request.param("end").map(str::parse) {
        Some(Ok(end)) => end,
        _ => return Response::text(400, "Bad Request: invalid end"),
    };

    let entries = store.scan_range(start, end).await;
    Response::ok(pairs::encode_pairs(&entries))
}

async fn all(store: &Store) -> Response {
    let entries = store.scan_all().await;
    Response::ok(pairs::encode_pairs(&entries))
}

async fn reset(store: &Store) -> Response {
    match store.reset().await {
        Ok(()) => Response::ok("OK"),
        Err(err) => {
            error!(error = %err, "reset failed");
            Response::text(500, "Internal Server Error")
        }
    }
}

async fn stats(store: &Store) -> Response {
    match serde_json::to_string(&store.stats().await) {
        Ok(body) => Response::json(200, body),
        Err(err) => {
            error!(error = %err, "stats serialization failed");
            Response::text(500, "Internal Server Error")
        }
    }
}
