//! HTTP/1 hosting for an [`Application`].
//!
//! The server accepts TCP connections and serves each one with `hyper` on a single thread: every
//! connection is a local task, so handlers and view engines never need to be `Send`. For every
//! request the body is collected, the application runs its chain, and the response goes out as
//! the chain left it.
//!
//! A chain that ends without finalizing the response is handled by [`Unfinished`].

use crate::app::Application;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::error::Error;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::Rc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::LocalSet;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

type ServeError = Box<dyn Error + Send + Sync>;

/// What to do with a request whose chain ended without finalizing the response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Unfinished {
    /// Never answer; the exchange stays open until the client gives up.
    #[default]
    Hold,
    /// Send the response as the chain left it.
    Finalize,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("application must be set")]
    MissingApp,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {source}")]
    InvalidAddress {
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct ServerBuilder {
    app: Option<Application>,
    address: Option<io::Result<Vec<SocketAddr>>>,
    unfinished: Unfinished,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { app: None, address: None, unfinished: Unfinished::default() }
    }

    /// Resolves the address now; a failure is reported by [`ServerBuilder::build`].
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn app(mut self, app: Application) -> Self {
        self.app = Some(app);
        self
    }

    pub fn unfinished(mut self, unfinished: Unfinished) -> Self {
        self.unfinished = unfinished;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let app = self.app.ok_or(ServerBuildError::MissingApp)?;
        let address = self
            .address
            .ok_or(ServerBuildError::MissingAddress)?
            .map_err(|source| ServerBuildError::InvalidAddress { source })?;
        if address.is_empty() {
            let source = io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing");
            return Err(ServerBuildError::InvalidAddress { source });
        }
        Ok(Server { app, address, unfinished: self.unfinished })
    }
}

#[derive(Debug)]
pub struct Server {
    app: Application,
    address: Vec<SocketAddr>,
    unfinished: Unfinished,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn address(&self) -> &[SocketAddr] {
        &self.address
    }

    /// Binds the address and serves connections until the process ends.
    pub async fn start(self) {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            warn!(cause = %e, "tracing subscriber already set, keep the existing one");
        }

        info!("start listening at {:?}", self.address);
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        LocalSet::new().run_until(self.serve(tcp_listener)).await;
    }

    /// Accept loop. Must run inside a [`LocalSet`].
    async fn serve(self, tcp_listener: TcpListener) {
        let app = Rc::new(self.app);
        let unfinished = self.unfinished;

        loop {
            let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let app = Rc::clone(&app);
            tokio::task::spawn_local(async move {
                let service = service_fn(move |req| serve_request(Rc::clone(&app), unfinished, req));
                match http1::Builder::new().serve_connection(TokioIo::new(tcp_stream), service).await {
                    Ok(()) => debug!(%remote_addr, "finished process, connection shutdown"),
                    Err(e) => error!(%remote_addr, cause = %e, "service has error, connection shutdown"),
                }
            });
        }
    }
}

async fn serve_request(
    app: Rc<Application>,
    unfinished: Unfinished,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, ServeError> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let handled = app.call(http::Request::from_parts(parts, body)).await?;

    if !handled.response().is_finished() {
        match unfinished {
            Unfinished::Hold => {
                warn!(outcome = ?handled.outcome(), "chain ended without finishing the response, hold the request");
                return std::future::pending().await;
            }
            Unfinished::Finalize => {
                debug!(outcome = ?handled.outcome(), "chain ended without finishing the response, send it as is");
            }
        }
    }

    Ok(handled.into_response().into_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{FaultPolicy, Flow, Next};
    use crate::handler::{HandlerResult, handler_fn};
    use crate::{Request, Response};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn pong(_req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
        res.send("pong")?;
        Ok(Flow::halt())
    }

    async fn echo(req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
        let body = req.text()?.to_owned();
        res.send(&body)?;
        Ok(Flow::halt())
    }

    async fn fail(_req: &mut Request, _res: &mut Response, _next: Next) -> HandlerResult {
        Err("broken".into())
    }

    fn app(policy: FaultPolicy) -> Application {
        Application::builder()
            .fault_policy(policy)
            .get("/ping", handler_fn(pong))
            .post("/echo", handler_fn(echo))
            .get("/fail", handler_fn(fail))
            .build()
    }

    async fn exchange(addr: SocketAddr, raw: &str) -> io::Result<String> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(raw.as_bytes()).await?;
        let mut buf = String::new();
        stream.read_to_string(&mut buf).await?;
        Ok(buf)
    }

    async fn with_server(app: Application, unfinished: Unfinished, test: impl AsyncFnOnce(SocketAddr)) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::builder().app(app).address(addr).unfinished(unfinished).build().unwrap();

        LocalSet::new()
            .run_until(async move {
                let handle = tokio::task::spawn_local(server.serve(listener));
                test(addr).await;
                handle.abort();
            })
            .await;
    }

    #[test]
    fn test_build_errors() {
        assert!(matches!(Server::builder().address("127.0.0.1:0").build(), Err(ServerBuildError::MissingApp)));
        let missing_address = Server::builder().app(app(FaultPolicy::default())).build();
        assert!(matches!(missing_address, Err(ServerBuildError::MissingAddress)));
        assert!(matches!(
            Server::builder().app(app(FaultPolicy::default())).address("not an address").build(),
            Err(ServerBuildError::InvalidAddress { .. })
        ));

        let server = Server::builder().app(app(FaultPolicy::default())).address("127.0.0.1:8080").build().unwrap();
        assert_eq!(server.address(), &["127.0.0.1:8080".parse::<SocketAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn test_serves_requests() {
        with_server(app(FaultPolicy::default()), Unfinished::Hold, async |addr| {
            let raw = "GET /ping?x=1 HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n";
            let response = exchange(addr, raw).await.unwrap();
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
            assert!(response.ends_with("\r\n\r\npong"), "{response}");

            let raw = "POST /echo HTTP/1.1\r\nhost: localhost\r\ncontent-length: 5\r\nconnection: close\r\n\r\nhello";
            let response = exchange(addr, raw).await.unwrap();
            assert!(response.ends_with("\r\n\r\nhello"), "{response}");

            let raw = "GET /fail HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n";
            let response = exchange(addr, raw).await.unwrap();
            assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{response}");
        })
        .await;
    }

    #[tokio::test]
    async fn test_unfinished_hold_keeps_request_open() {
        with_server(app(FaultPolicy::default()), Unfinished::Hold, async |addr| {
            let raw = "GET /missing HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n";
            let result = tokio::time::timeout(Duration::from_millis(200), exchange(addr, raw)).await;
            assert!(result.is_err());
        })
        .await;
    }

    #[tokio::test]
    async fn test_unfinished_finalize_sends_as_is() {
        with_server(app(FaultPolicy::default()), Unfinished::Finalize, async |addr| {
            let raw = "GET /missing HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n";
            let response = exchange(addr, raw).await.unwrap();
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        })
        .await;
    }

    #[tokio::test]
    async fn test_propagated_fault_closes_connection() {
        with_server(app(FaultPolicy::Propagate), Unfinished::Hold, async |addr| {
            let raw = "GET /fail HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n";
            // the connection is dropped, possibly reset
            let response = exchange(addr, raw).await.unwrap_or_default();
            assert!(response.is_empty(), "{response}");
        })
        .await;
    }
}
