//! File store handler for `/files/<name>`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};

/// Reads and writes files under one root directory.
#[derive(Debug, Clone, Copy)]
pub struct FileStore<'a> {
    root: &'a Path,
}

impl<'a> FileStore<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Joins `name` onto the root.
    ///
    /// Returns `None` for names that are empty, absolute, or that contain
    /// `..`, so a request can never address a path outside the root.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }

        let relative = Path::new(name);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        contained.then(|| self.root.join(relative))
    }

    /// Serves the whole file as `application/octet-stream`.
    pub async fn get(&self, name: &str) -> Response {
        let Some(path) = self.resolve(name) else {
            warn!(name, "rejected file name");
            return Response::error(StatusCode::BadRequest);
        };

        match tokio::fs::read(&path).await {
            Ok(contents) => {
                debug!(path = %path.display(), bytes = contents.len(), "serving file");
                Response::octet_stream(contents)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Response::not_found(),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read file");
                Response::internal_error()
            }
        }
    }

    /// Stores the request body, creating or truncating the file.
    ///
    /// Requires a valid `Content-Length`: absent is 411, malformed is 400.
    pub async fn put(&self, name: &str, request: &mut Request<'_>) -> Response {
        match request.content_length() {
            Ok(Some(_)) => {}
            Ok(None) => return Response::error(StatusCode::LengthRequired),
            Err(e) => {
                debug!(error = %e, "rejecting upload");
                return Response::error(StatusCode::BadRequest);
            }
        }

        let Some(path) = self.resolve(name) else {
            warn!(name, "rejected file name");
            return Response::error(StatusCode::BadRequest);
        };

        let Some(body) = request.body.take() else {
            return Response::error(StatusCode::LengthRequired);
        };

        let contents = match body.read_to_end().await {
            Ok(contents) => contents,
            Err(e) => {
                error!(error = %e, "failed to read request body");
                return Response::internal_error();
            }
        };

        if let Err(e) = tokio::fs::write(&path, &contents).await {
            error!(path = %path.display(), error = %e, "failed to write file");
            return Response::internal_error();
        }

        info!(path = %path.display(), bytes = contents.len(), "stored file");
        Response::created()
    }
}
