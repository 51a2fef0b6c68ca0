use micro_relay::{Application, Flow, HandlerResult, Next, Request, Response, Server, Unfinished, handler_fn};

async fn hello_world(_req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    res.send("hello world")?;
    Ok(Flow::halt())
}

async fn not_found(_req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    res.set_status(http::StatusCode::NOT_FOUND);
    res.send("404 not found")?;
    Ok(Flow::halt())
}

#[tokio::main]
async fn main() {
    let app = Application::builder().get("/", handler_fn(hello_world)).middleware(handler_fn(not_found)).build();

    Server::builder()
        .app(app)
        .address("127.0.0.1:3000")
        .unfinished(Unfinished::Finalize)
        .build()
        .unwrap()
        .start()
        .await;
}
