//! Renders `views/index.html` with minijinja, e.g. `<h1>Hello {{ name }}!</h1>`.

use micro_relay::{
    Application, Flow, HandlerResult, MINIJINJA_ENGINE, Next, Request, Response, Server, Setting, handler_fn,
};
use serde::Serialize;

#[derive(Serialize)]
struct Page<'a> {
    name: &'a str,
}

// curl -v "http://127.0.0.1:8080/?name=relay"
async fn index(req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    let name = req.query().get("name").unwrap_or("world").to_owned();
    res.render("index.html", &Page { name: &name }).await;
    Ok(Flow::halt())
}

#[tokio::main]
async fn main() {
    let app = Application::builder()
        .set(Setting::Views("views".into()))
        .set(Setting::ViewEngine(MINIJINJA_ENGINE.into()))
        .get("/", handler_fn(index))
        .build();

    Server::builder().app(app).address("127.0.0.1:8080").build().unwrap().start().await;
}
