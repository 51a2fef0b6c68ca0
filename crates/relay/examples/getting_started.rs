use http::StatusCode;
use micro_relay::{Application, Flow, HandlerResult, Next, Request, Response, Server, handler_fn};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Deserialize, Serialize, Debug)]
pub struct User {
    name: String,
    zip: String,
}

#[derive(Clone, Debug)]
struct RequestId(u64);

// every request passes here first
async fn access_log(req: &mut Request, _res: &mut Response, next: Next) -> HandlerResult {
    info!(method = %req.method(), path = req.path(), query = req.query().len(), "access");
    Ok(next.proceed())
}

async fn request_id(req: &mut Request, res: &mut Response, next: Next) -> HandlerResult {
    let id = req.query().get("rid").and_then(|rid| rid.parse().ok()).unwrap_or_default();
    req.extensions_mut().insert(RequestId(id));
    res.set_header("x-request-id", id.to_string())?;
    Ok(next.proceed())
}

// curl -v http://127.0.0.1:8080/ping?rid=7
async fn ping(req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    let id = req.extensions().get::<RequestId>().map_or(0, |id| id.0);
    res.send(&serde_json::json!({ "pong": id }))?;
    Ok(Flow::halt())
}

// curl -v "http://127.0.0.1:8080/users?name=hello&zip=world"
async fn find_user(req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    let user: User = req.query_as()?;
    res.send(&user)?;
    Ok(Flow::halt())
}

// curl -v -H 'Content-Type: application/json' -d '{"name":"hello","zip":"world"}' http://127.0.0.1:8080/users
// curl -v -d "name=hello&zip=world" http://127.0.0.1:8080/users
async fn create_user(req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    let content_type = req.headers().get(http::header::CONTENT_TYPE);
    let is_json = content_type.is_some_and(|v| v == mime::APPLICATION_JSON.as_ref());
    let user: User = if is_json { req.json()? } else { req.form()? };

    res.set_status(StatusCode::CREATED);
    res.send(&user)?;
    Ok(Flow::halt())
}

async fn count(_req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    res.send(&42)?;
    Ok(Flow::halt())
}

async fn not_found(req: &mut Request, res: &mut Response, _next: Next) -> HandlerResult {
    res.set_status(StatusCode::NOT_FOUND);
    res.send(&format!("no route for {} {}", req.method(), req.path()))?;
    Ok(Flow::halt())
}

#[tokio::main]
async fn main() {
    let app = Application::builder()
        .middleware((handler_fn(access_log), handler_fn(request_id)))
        .get("/ping", handler_fn(ping))
        .get("/users", handler_fn(find_user))
        .post("/users", handler_fn(create_user))
        .all("/count", handler_fn(count))
        .middleware(handler_fn(not_found))
        .build();

    Server::builder().app(app).address("127.0.0.1:8080").build().unwrap().start().await;
}
