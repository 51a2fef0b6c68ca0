//! A minimal web framework built around one ordered chain of middleware and routes.
//!
//! Handlers are registered on an [`ApplicationBuilder`]. Middleware match by path prefix and
//! every method, routes match an exact path and one method (or all). For every request the
//! [`Dispatcher`](dispatch::Dispatcher) walks the chain in registration order and invokes each
//! matching handler with a [`Next`] continuation; a handler either proceeds to the next matching
//! entry or halts the chain.
//!
//! # Example
//!
//! ```no_run
//! use micro_relay::{Application, Flow, HandlerResult, Next, Request, Response, Server, handler_fn};
//!
//! async fn logger(req: &mut Request, _res: &mut Response, next: Next) -> HandlerResult {
//!     println!("{} {}", req.method(), req.path());
//!     Ok(next.proceed())
//! }
//!
//! async fn pong(_req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
//!     res.send("pong")?;
//!     Ok(Flow::halt())
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Application::builder().middleware(handler_fn(logger)).get("/ping", handler_fn(pong)).build();
//!
//!     let server = Server::builder().app(app).address("127.0.0.1:8080").build().unwrap();
//!     server.start().await;
//! }
//! ```

mod app;
mod handler;
mod request;
mod response;
mod server;
mod static_files;

pub mod dispatch;
pub mod matcher;
pub mod settings;
pub mod table;
pub mod view;

pub use app::{Application, ApplicationBuilder, Handled, MINIJINJA_ENGINE};
pub use dispatch::{ChainEnd, DispatchError, DispatchOutcome, FaultPolicy, Flow, HandlerFault, Next};
pub use handler::{BoxedHandler, FnHandler, HandlerError, HandlerResult, IntoHandlers, RequestHandler, handler_fn};
pub use matcher::{MethodFilter, PathSpec};
pub use request::{ExtractError, QueryParams, Request};
pub use response::{Response, ResponseError};
pub use server::{Server, ServerBuildError, ServerBuilder, Unfinished};
pub use settings::{Setting, Settings};
pub use static_files::{ServeStatic, serve_static};
pub use view::{MiniJinjaEngine, RenderError, ViewEngine};
