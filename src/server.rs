// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::api::Method;
use crate::context::path_segments;
use crate::error::HandlerError;
use crate::router::{HandlerResult, Router};
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use std::convert::TryFrom;
use tide::http::{headers::CONTENT_TYPE, mime};
use tide::listener::ToListener;
use tide::{Next, Request, Response, StatusCode};
use tracing::{event, Level};

/// Deserialize the body of a request.
///
/// Bodies are always JSON. A body which does not decode is a client mistake and is reported as a
/// 400 failure, not as a routing miss.
pub fn decode_request_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, HandlerError> {
    serde_json::from_slice(body).map_err(|err| {
        HandlerError::bad_request(format!("unable to deserialize request body: {}", err))
    })
}

/// Render the outcome of a handler.
///
/// Success values are serialized as JSON with the success status of `method`; failures are
/// rendered by [failure].
pub fn render<T: Serialize>(method: Method, result: HandlerResult<T>) -> Response {
    match result.and_then(|value| serde_json::to_vec(&value).map_err(HandlerError::from)) {
        Ok(bytes) => Response::builder(method.success_status())
            .body(bytes)
            .content_type(mime::JSON)
            .build(),
        Err(err) => failure(&err),
    }
}

/// Render a handler failure: its status, its message as the raw body, and no content type.
///
/// A status which is not a valid HTTP status is answered with 500.
pub fn failure(err: &HandlerError) -> Response {
    event!(Level::WARN, "responding with error: {}", err);
    let status = StatusCode::try_from(err.status()).unwrap_or(StatusCode::InternalServerError);
    let mut res = Response::new(status);
    res.set_body(err.message().as_bytes().to_vec());
    res.remove_header(CONTENT_TYPE);
    res
}

/// The response to a request which no route matched.
pub fn not_found() -> Response {
    Response::builder(StatusCode::NotFound)
        .body("not found")
        .content_type(mime::PLAIN)
        .build()
}

impl Router {
    /// Answer a `tide` request, falling back to [not_found] if no route matches.
    pub async fn respond<State>(&self, mut req: Request<State>) -> tide::Result
    where
        State: Clone + Send + Sync + 'static,
    {
        let path = path_segments(req.url());
        let method = req.method();
        let body = req.body_bytes().await?;
        Ok(match self.dispatch(method, &path, body).await {
            Some(res) => res,
            None => not_found(),
        })
    }
}

/// Server middleware which renders framework errors like handler failures.
///
/// Errors raised outside of a handler (for instance while reading the request body) carry a
/// status and a message. They are turned into a response with that status and the message as a
/// plain body, so every failure a client sees has the same shape.
pub fn render_errors<'a, T: Clone + Send + Sync + 'static>(
    req: Request<T>,
    next: Next<'a, T>,
) -> BoxFuture<'a, tide::Result> {
    Box::pin(async {
        let mut res = next.run(req).await;
        if let Some(error) = res.take_error() {
            let error = HandlerError::new(error.status().into(), error.to_string());
            Ok(failure(&error))
        } else {
            Ok(res)
        }
    })
}

/// Server middleware which logs requests and responses.
pub fn trace<'a, T: Clone + Send + Sync + 'static>(
    req: Request<T>,
    next: Next<'a, T>,
) -> BoxFuture<'a, tide::Result> {
    Box::pin(async {
        event!(
            Level::INFO,
            "<-- received request {{method: {}, url: {}, content-type: {:?}}}",
            req.method(),
            req.url(),
            req.content_type(),
        );
        let res = next.run(req).await;
        event!(
            Level::INFO,
            "--> responding with {{status: {}, content-type: {:?}}}",
            res.status(),
            res.content_type(),
        );
        Ok(res)
    })
}

/// Build a `tide` server which sends every request to `router`.
pub fn server(router: Router) -> tide::Server<()> {
    let mut app = tide::new();
    app.with(trace).with(render_errors);
    let root = router.clone();
    app.at("/").all(move |req: Request<()>| {
        let router = root.clone();
        async move { router.respond(req).await }
    });
    app.at("/*path").all(move |req: Request<()>| {
        let router = router.clone();
        async move { router.respond(req).await }
    });
    app
}

/// Serve `router` on `listener` until the listener fails.
pub async fn serve(router: Router, listener: impl ToListener<()>) -> std::io::Result<()> {
    event!(Level::INFO, "serving {} routes", router.routes().len());
    server(router).listen(listener).await
}
