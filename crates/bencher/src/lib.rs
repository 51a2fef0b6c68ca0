use bytes::Bytes;
use micro_relay::{Application, Flow, HandlerResult, Next, Request, Response, handler_fn};

/// Shape of the route table a benchmark dispatches through.
#[derive(Debug, Copy, Clone)]
pub struct ChainCase {
    name: &'static str,
    group: ChainGroup,
    middleware: usize,
    routes: usize,
}

impl ChainCase {
    pub const fn new(name: &'static str, group: ChainGroup, middleware: usize, routes: usize) -> Self {
        Self { name, group, middleware, routes }
    }

    pub const fn small(name: &'static str, middleware: usize, routes: usize) -> Self {
        Self::new(name, ChainGroup::Small, middleware, routes)
    }

    pub const fn large(name: &'static str, middleware: usize, routes: usize) -> Self {
        Self::new(name, ChainGroup::Large, middleware, routes)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> ChainGroup {
        self.group
    }

    /// Number of entries a request for [`ChainCase::target`] walks through.
    pub fn entries(&self) -> usize {
        self.middleware + self.routes
    }

    /// Path of the last registered route.
    pub fn target(&self) -> String {
        format!("/route/{}", self.routes.saturating_sub(1))
    }

    /// Builds an application with `middleware` pass-through middleware followed by `routes`
    /// answering GET routes, each on its own path.
    pub fn application(&self) -> Application {
        let mut builder = Application::builder();
        for _ in 0..self.middleware {
            builder = builder.middleware(handler_fn(pass));
        }
        for index in 0..self.routes {
            builder = builder.get(format!("/route/{index}"), handler_fn(answer));
        }
        builder.build()
    }

    pub fn request(&self) -> http::Request<Bytes> {
        http::Request::get(self.target()).body(Bytes::new()).unwrap_or_default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainGroup {
    Small,
    Large,
}

impl ChainGroup {
    pub const ALL: [ChainGroup; 2] = [ChainGroup::Small, ChainGroup::Large];

    /// Criterion group name of the cases in this group.
    pub fn benchmark_group(&self) -> &'static str {
        match self {
            ChainGroup::Small => "dispatch_small",
            ChainGroup::Large => "dispatch_large",
        }
    }
}

async fn pass(_req: &mut Request, _res: &mut Response, next: Next) -> HandlerResult {
    Ok(next.proceed())
}

async fn answer(_req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    res.send("ok")?;
    Ok(Flow::halt())
}
