//! Serving files from a directory.

use crate::dispatch::{Flow, Next};
use crate::handler::{HandlerResult, RequestHandler};
use crate::{Request, Response};
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use mime::Mime;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const NOT_FOUND_BODY: &str = "<h1>404 Not Found</h1>";

/// Creates a handler answering every request it sees with a file from `root`.
///
/// The URI path is resolved under `root`, with `/` standing for `index.html`. A found file is
/// sent with status 200 and a content type guessed from its extension; anything else (missing
/// file, directory, path leaving `root`) gets a 404 with a small html body. The handler always
/// finalizes the response and never continues the chain.
///
/// ```no_run
/// use micro_relay::{Application, serve_static};
///
/// let app = Application::builder().middleware(serve_static("public")).build();
/// ```
pub fn serve_static(root: impl Into<PathBuf>) -> ServeStatic {
    ServeStatic { root: root.into() }
}

#[derive(Debug, Clone)]
pub struct ServeStatic {
    root: PathBuf,
}

impl ServeStatic {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `None` when the path has a component that would leave the root.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let relative = url_path.trim_start_matches('/');
        if relative.is_empty() {
            return Some(self.root.join("index.html"));
        }

        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(segment) => path.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(path)
    }
}

fn content_type(path: &Path) -> Mime {
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "html" | "htm" => mime::TEXT_HTML_UTF_8,
        "css" => mime::TEXT_CSS_UTF_8,
        "js" | "mjs" => mime::APPLICATION_JAVASCRIPT_UTF_8,
        "json" => mime::APPLICATION_JSON,
        "txt" => mime::TEXT_PLAIN_UTF_8,
        "xml" => mime::TEXT_XML,
        "csv" => mime::TEXT_CSV_UTF_8,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "svg" => mime::IMAGE_SVG,
        "bmp" => mime::IMAGE_BMP,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        "pdf" => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[async_trait(?Send)]
impl RequestHandler for ServeStatic {
    async fn invoke(&self, req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
        let Some(path) = self.map_path(req.uri().path()) else {
            debug!(path = req.uri().path(), "static path leaves the root");
            not_found(res);
            return Ok(Flow::halt());
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let content_type = HeaderValue::from_str(content_type(&path).as_ref())?;
                res.set_status(StatusCode::OK).set_header(CONTENT_TYPE, content_type)?.write(bytes).end();
            }
            Err(e) => {
                debug!(cause = %e, file = %path.display(), "can't read static file");
                not_found(res);
            }
        }
        Ok(Flow::halt())
    }
}

fn not_found(res: &mut Response) {
    res.set_status(StatusCode::NOT_FOUND).write(NOT_FOUND_BODY).end();
}
