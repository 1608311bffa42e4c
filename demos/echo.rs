//! bodytrace demo: every request body is traced, then echoed back.
//!
//! Run with:
//!   RUST_LOG=bodytrace=trace,info cargo run --example echo
//!
//! Try:
//!   curl -X POST http://localhost:3000/echo -d '{"a":1}'
//!   curl -X PUT  http://localhost:3000/users/42 -d 'name=alice'
//!   curl -X POST http://localhost:3000/echo --data-binary $'\xff'   # 400
//!
//! Each request prints one TRACE line such as `/echo, POST, {"a":1}`.

use bodytrace::{Error, Method, Request, Response, Router, Server, StatusCode, middleware};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = Router::new()
        .layer(middleware::trace_body().buffer_size(4096))
        .on(Method::POST, "/echo",      echo)
        .on(Method::PUT,  "/users/{id}", update_user);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// POST /echo
//
// The trace layer has already read this body; it was rewound, so the handler
// gets every byte.
async fn echo(mut req: Request) -> Result<Response, Error> {
    let body = req.body_mut().bytes().await?;
    Ok(Response::builder().header("x-echo-length", &body.len().to_string()).json(body))
}

// PUT /users/{id} → 200 with the id and the decoded body
async fn update_user(mut req: Request) -> Result<Response, Error> {
    let text = req.body_mut().text().await?;
    if text.is_empty() {
        return Ok(Response::status(StatusCode::BAD_REQUEST));
    }
    let id = req.param("id").unwrap_or("unknown");
    Ok(Response::text(format!("updated {id}: {text}")))
}
