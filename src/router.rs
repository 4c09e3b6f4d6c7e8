// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Request dispatch derived from an API description.
//!
//! A [Router] is built from a description and a tree of [Handler]s with the same shape: a single
//! handler for a leaf, a pair of handler trees for an [Alt], and the inner handler tree for a
//! [Segment] or [Query]. The shape is checked by the compiler through [Routable::Handlers], so a
//! description and its handlers can not disagree at run time.
//!
//! Construction flattens the description into an ordered list of routes, left alternatives
//! before right ones. Dispatch walks that list and answers with the first route whose labels
//! consume the whole request path and whose method matches. Later routes are never consulted,
//! and no handler runs unless its route matched.

use crate::api::{Alt, Api, Get, Method, Post, Query, Segment};
use crate::context::RemainingPath;
use crate::error::HandlerError;
use crate::server::{decode_request_body, render};
use futures::future::{BoxFuture, FutureExt};
use itertools::Itertools;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::sync::Arc;
use tide::http::Method as HttpMethod;
use tide::Response;
use tracing::{event, Level};

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Endpoint logic for a leaf taking an `I` and producing an `O`.
///
/// GET handlers take `()`; POST handlers take the decoded request body.
pub struct Handler<I, O> {
    f: Arc<dyn Fn(I) -> BoxFuture<'static, HandlerResult<O>> + Send + Sync>,
}

impl<I: 'static, O: 'static> Handler<I, O> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<O>> + Send + 'static,
    {
        Self {
            f: Arc::new(move |input| f(input).boxed()),
        }
    }

    pub fn call(&self, input: I) -> BoxFuture<'static, HandlerResult<O>> {
        (self.f)(input)
    }
}

impl<I, O> Clone for Handler<I, O> {
    fn clone(&self) -> Self {
        Self { f: self.f.clone() }
    }
}

impl<I, O> Debug for Handler<I, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").finish()
    }
}

trait Responder: Send + Sync {
    fn respond(&self, body: Vec<u8>) -> BoxFuture<'static, Response>;
}

struct GetResponder<T> {
    handler: Handler<(), T>,
}

impl<T: Serialize + Send + 'static> Responder for GetResponder<T> {
    fn respond(&self, _body: Vec<u8>) -> BoxFuture<'static, Response> {
        let reply = self.handler.call(());
        async move { render(Method::Get, reply.await) }.boxed()
    }
}

struct PostResponder<B, T> {
    handler: Handler<B, T>,
}

impl<B, T> Responder for PostResponder<B, T>
where
    B: DeserializeOwned + Send + 'static,
    T: Serialize + Send + 'static,
{
    fn respond(&self, body: Vec<u8>) -> BoxFuture<'static, Response> {
        let handler = self.handler.clone();
        async move {
            let result = match decode_request_body::<B>(&body) {
                Ok(input) => handler.call(input).await,
                Err(err) => Err(err),
            };
            render(Method::Post, result)
        }
        .boxed()
    }
}

/// A single endpoint: the labels it consumes, its method and its handler.
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: Vec<&'static str>,
    responder: Arc<dyn Responder>,
}

impl Route {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &[&'static str] {
        &self.path
    }

    /// Whether this route consumes exactly `path` and accepts `method`.
    pub fn matches<S: AsRef<str>>(&self, method: HttpMethod, path: RemainingPath<'_, S>) -> bool {
        let mut rest = path;
        for label in &self.path {
            match rest.strip(label) {
                Some(next) => rest = next,
                None => return false,
            }
        }
        rest.is_empty() && self.method.accepts(method)
    }
}

impl Debug for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method, self.path.iter().join("/"))
    }
}

/// The server interpretation of a description.
pub trait Routable: Api {
    /// Handlers for every endpoint of the description, in the same shape.
    type Handlers;

    /// Append one route per endpoint, in dispatch order, below the labels in `prefix`.
    fn collect(&self, prefix: &[&'static str], handlers: Self::Handlers, routes: &mut Vec<Route>);
}

impl<T: Serialize + Send + 'static> Routable for Get<T> {
    type Handlers = Handler<(), T>;

    fn collect(&self, prefix: &[&'static str], handler: Self::Handlers, routes: &mut Vec<Route>) {
        routes.push(Route {
            method: Method::Get,
            path: prefix.to_vec(),
            responder: Arc::new(GetResponder { handler }),
        });
    }
}

impl<B, T> Routable for Post<B, T>
where
    B: DeserializeOwned + Send + 'static,
    T: Serialize + Send + 'static,
{
    type Handlers = Handler<B, T>;

    fn collect(&self, prefix: &[&'static str], handler: Self::Handlers, routes: &mut Vec<Route>) {
        routes.push(Route {
            method: Method::Post,
            path: prefix.to_vec(),
            responder: Arc::new(PostResponder { handler }),
        });
    }
}

impl<A: Routable> Routable for Segment<A> {
    type Handlers = A::Handlers;

    fn collect(&self, prefix: &[&'static str], handlers: Self::Handlers, routes: &mut Vec<Route>) {
        let mut prefix = prefix.to_vec();
        prefix.push(self.label());
        self.inner().collect(&prefix, handlers, routes)
    }
}

impl<L: Routable, R: Routable> Routable for Alt<L, R> {
    type Handlers = (L::Handlers, R::Handlers);

    fn collect(
        &self,
        prefix: &[&'static str],
        (left, right): Self::Handlers,
        routes: &mut Vec<Route>,
    ) {
        self.left().collect(prefix, left, routes);
        self.right().collect(prefix, right, routes);
    }
}

// The router does not read query strings; a declared parameter is transparent here.
impl<A: Routable> Routable for Query<A> {
    type Handlers = A::Handlers;

    fn collect(&self, prefix: &[&'static str], handlers: Self::Handlers, routes: &mut Vec<Route>) {
        self.inner().collect(prefix, handlers, routes)
    }
}

/// A request-dispatch function derived from a description and its handlers.
///
/// The router is immutable once built and cheap to clone; concurrent dispatches share nothing but
/// the route list.
#[derive(Clone, Debug)]
pub struct Router {
    routes: Arc<Vec<Route>>,
}

impl Router {
    pub fn new<A: Routable>(api: &A, handlers: A::Handlers) -> Self {
        let mut routes = Vec::new();
        api.collect(&[], handlers, &mut routes);
        for route in &routes {
            event!(Level::DEBUG, "registered route {:?}", route);
        }
        Self {
            routes: Arc::new(routes),
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The first route matching `method` and `path`, if any.
    pub fn find<S: AsRef<str>>(&self, method: HttpMethod, path: &[S]) -> Option<&Route> {
        let path = RemainingPath::new(path);
        self.routes.iter().find(|route| route.matches(method, path))
    }

    /// Dispatch a request to the first matching route.
    ///
    /// Returns [None] if no route matches. A response is returned for every matched route,
    /// including routes whose handler failed.
    pub async fn dispatch<S: AsRef<str>>(
        &self,
        method: HttpMethod,
        path: &[S],
        body: Vec<u8>,
    ) -> Option<Response> {
        let route = match self.find(method, path) {
            Some(route) => route,
            None => {
                event!(
                    Level::DEBUG,
                    "no route for {} {:?}",
                    method,
                    RemainingPath::new(path)
                );
                return None;
            }
        };
        event!(Level::DEBUG, "dispatching {} to {:?}", method, route);
        Some(route.responder.respond(body).await)
    }
}
