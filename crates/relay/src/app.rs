//! The application: registration, settings and the per-request entry point.
//!
//! Everything is registered on an [`ApplicationBuilder`]. Middleware and routes go into the same
//! ordered route table, so the registration order is the order in which a request meets them.
//! [`ApplicationBuilder::build`] freezes the table into an [`Application`].
//!
//! ```
//! use micro_relay::{Application, HandlerResult, Next, Request, Response, handler_fn};
//!
//! async fn logger(req: &mut Request, _res: &mut Response, next: Next) -> HandlerResult {
//!     println!("{} {}", req.method(), req.path());
//!     Ok(next.proceed())
//! }
//!
//! async fn pong(_req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
//!     res.send("pong")?;
//!     Ok(micro_relay::Flow::halt())
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let app = Application::builder().middleware(handler_fn(logger)).get("/ping", handler_fn(pong)).build();
//!
//! let request = http::Request::get("/ping?x=1").body(bytes::Bytes::new()).unwrap();
//! let handled = app.call(request).await.unwrap();
//! assert_eq!(handled.response().body(), b"pong");
//! # });
//! ```

use crate::dispatch::{DispatchError, DispatchOutcome, Dispatcher, FaultPolicy};
use crate::handler::IntoHandlers;
use crate::matcher::{self, MethodFilter, PathMatcher, PathSpec};
use crate::settings::{Setting, Settings};
use crate::table::RouteTable;
use crate::view::{MiniJinjaEngine, ViewEngine, Views};
use crate::{Request, Response};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Name under which [`MiniJinjaEngine`] is registered by default.
pub const MINIJINJA_ENGINE: &str = "minijinja";

pub struct ApplicationBuilder {
    table: RouteTable,
    settings: Settings,
    engines: HashMap<String, Box<dyn ViewEngine>>,
    fault_policy: FaultPolicy,
}

macro_rules! method_route {
    ($method:ident, $method_filter:ident) => {
        #[doc = concat!("Registers handlers for `", stringify!($method), "` requests whose path is exactly `path`.")]
        pub fn $method(self, path: impl Into<PathSpec>, handlers: impl IntoHandlers) -> Self {
            self.route(matcher::$method_filter(), path, handlers)
        }
    };
}

impl ApplicationBuilder {
    fn new() -> Self {
        let mut engines: HashMap<String, Box<dyn ViewEngine>> = HashMap::new();
        engines.insert(MINIJINJA_ENGINE.to_owned(), Box::new(MiniJinjaEngine::new()));
        Self { table: RouteTable::new(), settings: Settings::default(), engines, fault_policy: FaultPolicy::default() }
    }

    pub fn set(mut self, setting: Setting) -> Self {
        self.settings.set(setting);
        self
    }

    /// Registers a view engine, selected by `Setting::ViewEngine(name)`. A later registration
    /// under the same name replaces the earlier one.
    pub fn engine(mut self, name: impl Into<String>, engine: impl ViewEngine + 'static) -> Self {
        self.engines.insert(name.into(), Box::new(engine));
        self
    }

    pub fn fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    /// Registers middleware running for every path and every method.
    pub fn middleware(self, handlers: impl IntoHandlers) -> Self {
        self.middleware_at(PathSpec::All, handlers)
    }

    /// Registers middleware running for every method on paths starting with `path`.
    ///
    /// A literal is a plain string prefix, not segment aware: `/api` also covers `/apiextra`.
    /// A pattern must match at the start of the path.
    pub fn middleware_at(mut self, path: impl Into<PathSpec>, handlers: impl IntoHandlers) -> Self {
        let matcher = PathMatcher::prefix(path.into());
        debug!(%matcher, "register middleware");
        self.table.register_all(matcher, MethodFilter::Any, handlers.into_handlers());
        self
    }

    /// Registers handlers for requests passing `method` whose path is exactly `path`.
    ///
    /// A pattern is used as given, so it should carry its own anchors.
    pub fn route(mut self, method: MethodFilter, path: impl Into<PathSpec>, handlers: impl IntoHandlers) -> Self {
        let matcher = PathMatcher::exact(path.into());
        debug!(%matcher, %method, "register route");
        self.table.register_all(matcher, method, handlers.into_handlers());
        self
    }

    /// Registers handlers for every method on the exact `path`.
    pub fn all(self, path: impl Into<PathSpec>, handlers: impl IntoHandlers) -> Self {
        self.route(MethodFilter::Any, path, handlers)
    }

    method_route!(get, get_method);
    method_route!(post, post_method);
    method_route!(put, put_method);
    method_route!(delete, delete_method);
    method_route!(patch, patch_method);
    method_route!(head, head_method);
    method_route!(options, options_method);
    method_route!(connect, connect_method);
    method_route!(trace, trace_method);

    pub fn build(self) -> Application {
        let views = Rc::new(Views::new(self.settings, self.engines));
        Application { table: self.table, views, fault_policy: self.fault_policy }
    }
}

impl fmt::Debug for ApplicationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationBuilder")
            .field("table", &self.table)
            .field("settings", &self.settings)
            .field("fault_policy", &self.fault_policy)
            .finish_non_exhaustive()
    }
}

/// A frozen route table plus the settings and engines its handlers render with.
#[derive(Debug)]
pub struct Application {
    table: RouteTable,
    views: Rc<Views>,
    fault_policy: FaultPolicy,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn settings(&self) -> &Settings {
        self.views.settings()
    }

    pub fn route_table(&self) -> &RouteTable {
        &self.table
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    /// A fresh response able to render with this application's views.
    pub fn response(&self) -> Response {
        Response::with_views(Rc::clone(&self.views))
    }

    /// Decorates a raw request and runs it through the chain from the first entry.
    pub async fn call(&self, req: http::Request<Bytes>) -> Result<Handled, DispatchError> {
        let mut request = Request::from_http(req);
        let mut response = self.response();
        let outcome = self.handle(&mut request, &mut response).await?;
        Ok(Handled { response, outcome })
    }

    /// Runs an already decorated pair through the chain from the first entry.
    pub async fn handle(&self, req: &mut Request, res: &mut Response) -> Result<DispatchOutcome, DispatchError> {
        Dispatcher::new(&self.table, self.fault_policy).dispatch(req, res).await
    }
}

/// The response of one request and how its chain ended.
#[derive(Debug)]
pub struct Handled {
    response: Response,
    outcome: DispatchOutcome,
}

impl Handled {
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn outcome(&self) -> DispatchOutcome {
        self.outcome
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ChainEnd, Flow, Next};
    use crate::handler::{BoxedHandler, HandlerResult, RequestHandler, handler_fn};
    use async_trait::async_trait;
    use http::{Method, StatusCode};
    use regex::Regex;
    use serde_json::json;
    use std::cell::RefCell;
    use std::path::Path;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records its name, then either continues or answers with its name.
    struct Step {
        name: &'static str,
        log: Log,
        answer: bool,
    }

    #[async_trait(?Send)]
    impl RequestHandler for Step {
        async fn invoke(&self, _req: &mut Request, res: &mut Response, next: Next) -> HandlerResult {
            self.log.borrow_mut().push(self.name.to_owned());
            if self.answer {
                res.send(self.name)?;
                return Ok(Flow::halt());
            }
            Ok(next.proceed())
        }
    }

    fn pass(log: &Log, name: &'static str) -> Step {
        Step { name, log: Rc::clone(log), answer: false }
    }

    fn answer(log: &Log, name: &'static str) -> Step {
        Step { name, log: Rc::clone(log), answer: true }
    }

    fn request(method: Method, uri: &str) -> http::Request<Bytes> {
        http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let log = Log::default();
        let app = Application::builder().middleware(pass(&log, "logger")).get("/ping", answer(&log, "pong")).build();

        let handled = app.call(request(Method::GET, "/ping?x=1")).await.unwrap();

        assert_eq!(*log.borrow(), vec!["logger", "pong"]);
        assert_eq!(handled.outcome().end(), ChainEnd::Halted);
        assert_eq!(handled.response().status(), StatusCode::OK);
        assert_eq!(handled.response().body(), b"pong");
    }

    #[tokio::test]
    async fn test_missing_route_invokes_nothing() {
        let log = Log::default();
        let app = Application::builder().get("/ping", answer(&log, "pong")).build();

        let handled = app.call(request(Method::GET, "/missing")).await.unwrap();

        assert!(log.borrow().is_empty());
        assert_eq!(handled.outcome().invoked(), 0);
        assert_eq!(handled.outcome().end(), ChainEnd::Exhausted);
        assert!(!handled.response().is_finished());
    }

    #[tokio::test]
    async fn test_several_handlers_for_one_route() {
        let log = Log::default();
        let app = Application::builder().get("/a", (pass(&log, "h1"), answer(&log, "h2"))).build();
        assert_eq!(app.route_table().len(), 2);

        let handled = app.call(request(Method::GET, "/a")).await.unwrap();
        assert_eq!(*log.borrow(), vec!["h1", "h2"]);
        assert_eq!(handled.response().body(), b"h2");
    }

    #[tokio::test]
    async fn test_method_routes() {
        let log = Log::default();
        let app = Application::builder()
            .get("/items", answer(&log, "get"))
            .post("/items", answer(&log, "post"))
            .delete("/items", answer(&log, "delete"))
            .all("/any", answer(&log, "all"))
            .build();

        let handled = app.call(request(Method::POST, "/items")).await.unwrap();
        assert_eq!(handled.response().body(), b"post");

        let handled = app.call(request(Method::GET, "/items")).await.unwrap();
        assert_eq!(handled.response().body(), b"get");

        let handled = app.call(request(Method::PUT, "/items")).await.unwrap();
        assert_eq!(handled.outcome().invoked(), 0);

        for method in [Method::GET, Method::PATCH, Method::OPTIONS] {
            let handled = app.call(request(method, "/any")).await.unwrap();
            assert_eq!(handled.response().body(), b"all");
        }

        assert_eq!(*log.borrow(), vec!["post", "get", "all", "all", "all"]);
    }

    #[tokio::test]
    async fn test_middleware_order_and_prefix() {
        let log = Log::default();
        let app = Application::builder()
            .middleware(pass(&log, "everywhere"))
            .middleware_at("/api", pass(&log, "api"))
            .middleware_at(Regex::new(r"/v[0-9]+").unwrap(), pass(&log, "versioned"))
            .get("/api/users", answer(&log, "users"))
            .get("/apiextra", answer(&log, "extra"))
            .build();

        app.call(request(Method::GET, "/api/users")).await.unwrap();
        assert_eq!(*log.borrow(), vec!["everywhere", "api", "users"]);
        log.borrow_mut().clear();

        app.call(request(Method::GET, "/apiextra")).await.unwrap();
        assert_eq!(*log.borrow(), vec!["everywhere", "api", "extra"]);
        log.borrow_mut().clear();

        app.call(request(Method::POST, "/v2/anything")).await.unwrap();
        assert_eq!(*log.borrow(), vec!["everywhere", "versioned"]);
        log.borrow_mut().clear();

        app.call(request(Method::GET, "/users/v2")).await.unwrap();
        assert_eq!(*log.borrow(), vec!["everywhere"]);
    }

    #[tokio::test]
    async fn test_route_after_answer_is_not_reached() {
        let log = Log::default();
        let handlers: Vec<BoxedHandler> = vec![Box::new(answer(&log, "first")), Box::new(answer(&log, "second"))];
        let app = Application::builder().all("/", handlers).build();

        let handled = app.call(request(Method::GET, "/")).await.unwrap();
        assert_eq!(*log.borrow(), vec!["first"]);
        assert_eq!(handled.response().body(), b"first");
    }

    #[tokio::test]
    async fn test_fault_policies() {
        async fn fail(_req: &mut Request, _res: &mut Response, _next: Next) -> HandlerResult {
            Err("broken".into())
        }

        let app = Application::builder().get("/fail", handler_fn(fail)).build();
        let handled = app.call(request(Method::GET, "/fail")).await.unwrap();
        assert_eq!(handled.outcome().end(), ChainEnd::Faulted);
        assert_eq!(handled.response().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(handled.response().is_finished());

        let app = Application::builder()
            .fault_policy(FaultPolicy::Propagate)
            .middleware(handler_fn(async |_req: &mut Request, _res: &mut Response, next: Next| -> HandlerResult {
                Ok(next.proceed())
            }))
            .get("/fail", handler_fn(fail))
            .build();
        let err = app.call(request(Method::GET, "/fail")).await.unwrap_err();
        assert_eq!(err.index(), 1);
        assert_eq!(err.path(), "/fail");
    }

    #[tokio::test]
    async fn test_handle_reuses_decorated_pair() {
        let log = Log::default();
        let app = Application::builder().middleware(pass(&log, "m")).post("/x", answer(&log, "x")).build();

        let mut req = Request::from_http(request(Method::POST, "/x"));
        let mut res = app.response();
        let outcome = app.handle(&mut req, &mut res).await.unwrap();

        assert_eq!(outcome.invoked(), 2);
        assert_eq!(res.body(), b"x");
    }

    #[test]
    fn test_settings() {
        let app = Application::builder()
            .set(Setting::Views("templates".into()))
            .set(Setting::ViewEngine("one".into()))
            .set(Setting::ViewEngine(MINIJINJA_ENGINE.into()))
            .build();

        assert_eq!(app.settings().views(), Path::new("templates"));
        assert_eq!(app.settings().view_engine(), Some(MINIJINJA_ENGINE));
        assert_eq!(app.fault_policy(), FaultPolicy::default());
    }

    #[tokio::test]
    async fn test_render_with_default_engine() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>{{ greeting }}, {{ name }}</p>").unwrap();

        async fn index(_req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
            res.render("index.html", &json!({"greeting": "hi", "name": "relay"})).await;
            Ok(Flow::halt())
        }

        let app = Application::builder()
            .set(Setting::Views(dir.path().to_path_buf()))
            .set(Setting::ViewEngine(MINIJINJA_ENGINE.into()))
            .get("/", handler_fn(index))
            .build();

        let handled = app.call(request(Method::GET, "/")).await.unwrap();
        assert_eq!(handled.response().status(), StatusCode::OK);
        assert_eq!(handled.response().body(), b"<p>hi, relay</p>");

        let app = Application::builder().get("/", handler_fn(index)).build();
        let handled = app.call(request(Method::GET, "/")).await.unwrap();
        assert_eq!(handled.response().status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(handled.response().body().is_empty());
    }
}
