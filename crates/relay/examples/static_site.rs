//! Serves `./public` on every path under `/`, with a JSON status route in front of it.

use micro_relay::{Application, Flow, HandlerResult, Next, Request, Response, Server, handler_fn, serve_static};

async fn status(_req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    res.send(&serde_json::json!({ "status": "up" }))?;
    Ok(Flow::halt())
}

#[tokio::main]
async fn main() {
    let app = Application::builder().get("/status", handler_fn(status)).middleware(serve_static("public")).build();

    Server::builder().app(app).address("127.0.0.1:8080").build().unwrap().start().await;
}
