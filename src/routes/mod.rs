//! Request routing
//!
//! Maps a method and path to a [`Route`] and runs the matching handler.
//! Exact paths are checked before prefixes; the prefix remainder is taken
//! verbatim, without percent-decoding.

pub mod files;

use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use files::FileStore;

pub const GREETING: &str = "Hello, this is a 200!";
pub const NO_USER_AGENT: &str = "No User-Agent found";

const ECHO_PREFIX: &str = "/echo/";
const FILES_PREFIX: &str = "/files/";

/// The outcome of routing a request, derived only from method and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    UserAgent,
    Echo(String),
    FileGet(String),
    FilePost(String),
    MethodNotAllowed,
    NotFound,
}

impl Route {
    pub fn resolve(method: &Method, path: &str) -> Self {
        match path {
            "/" => return Route::Root,
            "/user-agent" => return Route::UserAgent,
            _ => {}
        }

        if let Some(segment) = path.strip_prefix(ECHO_PREFIX) {
            return Route::Echo(segment.to_string());
        }

        if let Some(name) = path.strip_prefix(FILES_PREFIX) {
            return match method {
                Method::GET => Route::FileGet(name.to_string()),
                Method::POST => Route::FilePost(name.to_string()),
                _ => Route::MethodNotAllowed,
            };
        }

        Route::NotFound
    }

    /// Runs the handler for this route.
    pub async fn dispatch(self, request: &mut Request<'_>, files: &FileStore<'_>) -> Response {
        match self {
            Route::Root => Response::text(GREETING),
            Route::UserAgent => {
                let agent = request.header("User-Agent").unwrap_or(NO_USER_AGENT);
                Response::text(agent.to_string())
            }
            Route::Echo(segment) => Response::text(segment),
            Route::FileGet(name) => files.get(&name).await,
            Route::FilePost(name) => files.put(&name, request).await,
            Route::MethodNotAllowed => Response::error(StatusCode::MethodNotAllowed),
            Route::NotFound => Response::not_found(),
        }
    }
}
