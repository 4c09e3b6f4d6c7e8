// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Remote calls derived from an API description.
//!
//! [client] turns a description into a tree of operations with the same shape: a [GetCall] or
//! [PostCall] per leaf and a pair per [Alt]. Each operation carries the path and query parameters
//! accumulated on the way down to its leaf. Nothing is tried or chosen at run time; the caller
//! picks the operation it wants out of the tree and calls it with the base address of a server.

use crate::api::{Alt, Api, Get, Method, Post, Query, Segment};
use crate::context::ClientContext;
use crate::error::{ClientError, EncodeBodySnafu, InvalidResponseBodySnafu, UnexpectedStatusSnafu};
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use snafu::ResultExt;
use std::convert::TryInto;
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::time::Duration;
use surf::http::mime;
use surf::middleware::Next;
use surf::{Client, Request, Response};
use tracing::{event, Level};
use url::Url;

/// Settings for the HTTP client behind a [Transport].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-request timeout in milliseconds, or no timeout.
    pub timeout_ms: Option<u64>,
    pub max_connections_per_host: usize,
    pub tcp_no_delay: bool,
    pub http_keep_alive: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Some(30_000),
            max_connections_per_host: 50,
            tcp_no_delay: true,
            http_keep_alive: true,
        }
    }
}

/// The shared HTTP client used by every generated operation.
///
/// A transport owns a connection pool. Create one at startup, hand it to [client], and drop it
/// at shutdown; clones share the same pool. Calls through the same transport may run
/// concurrently.
#[derive(Clone, Debug)]
pub struct Transport {
    client: Client,
}

impl Transport {
    pub fn new(config: &TransportConfig) -> Result<Self, ClientError> {
        let client: Client = surf::Config::new()
            .set_timeout(config.timeout_ms.map(Duration::from_millis))
            .set_max_connections_per_host(config.max_connections_per_host)
            .set_tcp_no_delay(config.tcp_no_delay)
            .set_http_keep_alive(config.http_keep_alive)
            .try_into()
            .map_err(|err| ClientError::Transport {
                message: format!("unable to create HTTP client: {}", err),
            })?;
        Ok(Self::with_client(client))
    }

    /// Use an existing `surf` client, for instance one backed by an in-process server.
    pub fn with_client(client: Client) -> Self {
        Self {
            client: client.with(trace),
        }
    }

    async fn send(&self, req: Request) -> Result<Response, ClientError> {
        self.client.send(req).await.map_err(ClientError::transport)
    }
}

/// Client middleware which logs requests and responses.
pub fn trace<'a>(
    req: Request,
    client: Client,
    next: Next<'a>,
) -> BoxFuture<'a, surf::Result<Response>> {
    Box::pin(async move {
        event!(
            Level::DEBUG,
            "--> sending request {{method: {}, url: {}}}",
            req.method(),
            req.url(),
        );
        let res = next.run(req, client).await?;
        event!(
            Level::DEBUG,
            "<-- received response {{status: {}, content-type: {:?}}}",
            res.status(),
            res.content_type(),
        );
        Ok(res)
    })
}

/// Check the status of a response and deserialize its body.
///
/// A response is only decoded if its status is the success status of `method`. Otherwise the
/// body is kept, as text, in the error.
pub async fn response_body<T: DeserializeOwned>(
    method: Method,
    mut res: Response,
) -> Result<T, ClientError> {
    let expected = method.success_status();
    if res.status() != expected {
        let message = res
            .body_bytes()
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default();
        return UnexpectedStatusSnafu {
            status: u16::from(res.status()),
            expected: u16::from(expected),
            message,
        }
        .fail();
    }
    let bytes = res.body_bytes().await.map_err(ClientError::transport)?;
    serde_json::from_slice(&bytes).context(InvalidResponseBodySnafu)
}

async fn issue<T: DeserializeOwned>(
    transport: &Transport,
    method: Method,
    ctx: &ClientContext,
    base: &Url,
) -> Result<T, ClientError> {
    let url = ctx.target(base)?;
    let mut req = Request::new(method.as_http(), url.clone());
    if !ctx.body().is_empty() {
        req.set_body(ctx.body().to_vec());
        req.set_content_type(mime::JSON);
    }
    let result = match transport.send(req).await {
        Ok(res) => response_body(method, res).await,
        Err(err) => Err(err),
    };
    if let Err(err) = &result {
        event!(Level::WARN, "{} {} failed: {}", method, url, err);
    }
    result
}

/// A remote GET endpoint returning a `T`.
pub struct GetCall<T> {
    ctx: ClientContext,
    transport: Transport,
    _result: PhantomData<fn() -> T>,
}

impl<T> GetCall<T> {
    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    /// A copy of this operation with the query parameter `name` set to `value`.
    ///
    /// Only parameters declared by the description can be set. Any other name is logged and
    /// ignored, and nothing is added to the request.
    pub fn with_param(&self, name: &str, value: impl ToString) -> Self {
        self.replace_context(self.ctx.clone().set_query(name, Some(value.to_string())))
    }

    /// A copy of this operation which leaves the query parameter `name` out.
    pub fn without_param(&self, name: &str) -> Self {
        self.replace_context(self.ctx.clone().set_query(name, None))
    }

    fn replace_context(&self, ctx: ClientContext) -> Self {
        Self {
            ctx,
            transport: self.transport.clone(),
            _result: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> GetCall<T> {
    pub async fn call(&self, base: &Url) -> Result<T, ClientError> {
        issue(&self.transport, Method::Get, &self.ctx, base).await
    }
}

impl<T> Clone for GetCall<T> {
    fn clone(&self) -> Self {
        self.replace_context(self.ctx.clone())
    }
}

impl<T> Debug for GetCall<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetCall").field("ctx", &self.ctx).finish()
    }
}

/// A remote POST endpoint taking a `B` and returning a `T`.
pub struct PostCall<B, T> {
    ctx: ClientContext,
    transport: Transport,
    _exchange: PhantomData<fn(B) -> T>,
}

impl<B, T> PostCall<B, T> {
    pub fn context(&self) -> &ClientContext {
        &self.ctx
    }

    pub fn with_param(&self, name: &str, value: impl ToString) -> Self {
        self.replace_context(self.ctx.clone().set_query(name, Some(value.to_string())))
    }

    pub fn without_param(&self, name: &str) -> Self {
        self.replace_context(self.ctx.clone().set_query(name, None))
    }

    fn replace_context(&self, ctx: ClientContext) -> Self {
        Self {
            ctx,
            transport: self.transport.clone(),
            _exchange: PhantomData,
        }
    }
}

impl<B: Serialize, T: DeserializeOwned> PostCall<B, T> {
    pub async fn call(&self, base: &Url, body: &B) -> Result<T, ClientError> {
        let body = serde_json::to_vec(body).context(EncodeBodySnafu)?;
        let ctx = self.ctx.clone().with_body(body);
        issue(&self.transport, Method::Post, &ctx, base).await
    }
}

impl<B, T> Clone for PostCall<B, T> {
    fn clone(&self) -> Self {
        self.replace_context(self.ctx.clone())
    }
}

impl<B, T> Debug for PostCall<B, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostCall").field("ctx", &self.ctx).finish()
    }
}

/// The client interpretation of a description.
pub trait Remote: Api {
    /// Operations for every endpoint of the description, in the same shape.
    type Client;

    /// Build the operations of this description below the request state in `ctx`.
    fn operations(&self, ctx: ClientContext, transport: &Transport) -> Self::Client;
}

impl<T: DeserializeOwned> Remote for Get<T> {
    type Client = GetCall<T>;

    fn operations(&self, ctx: ClientContext, transport: &Transport) -> Self::Client {
        GetCall {
            ctx,
            transport: transport.clone(),
            _result: PhantomData,
        }
    }
}

impl<B: Serialize, T: DeserializeOwned> Remote for Post<B, T> {
    type Client = PostCall<B, T>;

    fn operations(&self, ctx: ClientContext, transport: &Transport) -> Self::Client {
        PostCall {
            ctx,
            transport: transport.clone(),
            _exchange: PhantomData,
        }
    }
}

impl<A: Remote> Remote for Segment<A> {
    type Client = A::Client;

    fn operations(&self, ctx: ClientContext, transport: &Transport) -> Self::Client {
        self.inner()
            .operations(ctx.push_segment(self.label()), transport)
    }
}

impl<L: Remote, R: Remote> Remote for Alt<L, R> {
    type Client = (L::Client, R::Client);

    fn operations(&self, ctx: ClientContext, transport: &Transport) -> Self::Client {
        (
            self.left().operations(ctx.clone(), transport),
            self.right().operations(ctx, transport),
        )
    }
}

impl<A: Remote> Remote for Query<A> {
    type Client = A::Client;

    fn operations(&self, ctx: ClientContext, transport: &Transport) -> Self::Client {
        self.inner()
            .operations(ctx.declare_query(self.name()), transport)
    }
}

/// Derive the operations of `api`, all sharing `transport`.
pub fn client<A: Remote>(api: &A, transport: &Transport) -> A::Client {
    api.operations(ClientContext::new(), transport)
}
