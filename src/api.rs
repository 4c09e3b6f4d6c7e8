// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! API descriptions.
//!
//! An API description is an ordinary value built from four kinds of nodes: the leaf endpoints
//! [Get] and [Post], the literal path component [Segment] and the ordered choice [Alt]. [Query]
//! additionally declares a named query parameter for the endpoints beneath it. Descriptions have
//! no behavior of their own; they are interpreted by [Router](crate::router::Router) on the
//! server and by [client](crate::client::client) on the client. Because both interpreters walk the
//! same value, a server and a client derived from one description agree on every route by
//! construction.
//!
//! ```ignore
//! let api = segment("users", get::<Vec<User>>().or(post::<User, User>()))
//!     .or(segment("health", get::<String>()));
//! ```

use itertools::Itertools;
use std::fmt::{self, Debug, Display, Formatter};
use std::marker::PhantomData;
use tide::http::Method as HttpMethod;
use tide::StatusCode;

/// The HTTP method of a leaf endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// The status of a successful response to a request with this method.
    pub fn success_status(&self) -> StatusCode {
        match self {
            Method::Get => StatusCode::Ok,
            Method::Post => StatusCode::Created,
        }
    }

    pub fn as_http(&self) -> HttpMethod {
        match self {
            Method::Get => HttpMethod::Get,
            Method::Post => HttpMethod::Post,
        }
    }

    /// Whether an incoming request method selects leaves with this method.
    pub fn accepts(&self, method: HttpMethod) -> bool {
        self.as_http() == method
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A leaf endpoint answering GET requests with a JSON-encoded `T`.
pub struct Get<T> {
    _result: PhantomData<fn() -> T>,
}

/// A leaf endpoint accepting a JSON-encoded `B` by POST and answering with a JSON-encoded `T`.
pub struct Post<B, T = B> {
    _exchange: PhantomData<fn(B) -> T>,
}

/// A literal path component in front of `inner`.
#[derive(Clone, Copy, Debug)]
pub struct Segment<A> {
    label: &'static str,
    inner: A,
}

/// An ordered choice: `left` is consulted before `right`.
#[derive(Clone, Copy, Debug)]
pub struct Alt<L, R> {
    left: L,
    right: R,
}

/// Declares the query parameter `name` for every endpoint in `inner`.
///
/// Query parameters are a client-side feature: generated operations carry one optional value per
/// declared parameter, while the router does not look at the query string at all.
#[derive(Clone, Copy, Debug)]
pub struct Query<A> {
    name: &'static str,
    inner: A,
}

pub fn get<T>() -> Get<T> {
    Get {
        _result: PhantomData,
    }
}

pub fn post<B, T>() -> Post<B, T> {
    Post {
        _exchange: PhantomData,
    }
}

/// A literal path component `label` in front of `inner`.
///
/// Any text can be a label; it is percent-encoded on the wire and decoded again before matching.
///
/// # Panics
///
/// Panics if `label` is empty, `.` or `..`. URL paths drop or collapse such segments, so no
/// request could ever reach them.
pub fn segment<A>(label: &'static str, inner: A) -> Segment<A> {
    assert!(
        !matches!(label, "" | "." | ".."),
        "unroutable path label {:?}",
        label
    );
    Segment { label, inner }
}

pub fn alt<L, R>(left: L, right: R) -> Alt<L, R> {
    Alt { left, right }
}

pub fn query<A>(name: &'static str, inner: A) -> Query<A> {
    Query { name, inner }
}

// The leaves are zero-sized markers. Deriving would put bounds on the type parameters.
impl<T> Clone for Get<T> {
    fn clone(&self) -> Self {
        get()
    }
}

impl<T> Copy for Get<T> {}

impl<T> Debug for Get<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Get<{}>", std::any::type_name::<T>())
    }
}

impl<B, T> Clone for Post<B, T> {
    fn clone(&self) -> Self {
        post()
    }
}

impl<B, T> Copy for Post<B, T> {}

impl<B, T> Debug for Post<B, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Post<{}, {}>",
            std::any::type_name::<B>(),
            std::any::type_name::<T>()
        )
    }
}

impl<A> Segment<A> {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

impl<L, R> Alt<L, R> {
    pub fn left(&self) -> &L {
        &self.left
    }

    pub fn right(&self) -> &R {
        &self.right
    }
}

impl<A> Query<A> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

/// One endpoint of a description, as seen by a listing of the API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointInfo {
    pub method: Method,
    pub path: Vec<&'static str>,
    pub query: Vec<&'static str>,
}

impl Display for EndpointInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.method, self.path.iter().join("/"))?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query.iter().join("&"))?;
        }
        Ok(())
    }
}

/// Common interface of all description nodes.
pub trait Api {
    /// Append the endpoints of this description, in the order the router tries them.
    ///
    /// `path` and `query` are the labels and parameter names declared by enclosing nodes.
    fn visit(&self, path: &[&'static str], query: &[&'static str], out: &mut Vec<EndpointInfo>);

    fn endpoints(&self) -> Vec<EndpointInfo> {
        let mut out = Vec::new();
        self.visit(&[], &[], &mut out);
        out
    }

    /// Offer `right` as an alternative to this description.
    fn or<R: Api>(self, right: R) -> Alt<Self, R>
    where
        Self: Sized,
    {
        alt(self, right)
    }
}

fn leaf(method: Method, path: &[&'static str], query: &[&'static str], out: &mut Vec<EndpointInfo>) {
    out.push(EndpointInfo {
        method,
        path: path.to_vec(),
        query: query.to_vec(),
    });
}

impl<T> Api for Get<T> {
    fn visit(&self, path: &[&'static str], query: &[&'static str], out: &mut Vec<EndpointInfo>) {
        leaf(Method::Get, path, query, out)
    }
}

impl<B, T> Api for Post<B, T> {
    fn visit(&self, path: &[&'static str], query: &[&'static str], out: &mut Vec<EndpointInfo>) {
        leaf(Method::Post, path, query, out)
    }
}

impl<A: Api> Api for Segment<A> {
    fn visit(&self, path: &[&'static str], query: &[&'static str], out: &mut Vec<EndpointInfo>) {
        let mut path = path.to_vec();
        path.push(self.label);
        self.inner.visit(&path, query, out)
    }
}

impl<L: Api, R: Api> Api for Alt<L, R> {
    fn visit(&self, path: &[&'static str], query: &[&'static str], out: &mut Vec<EndpointInfo>) {
        self.left.visit(path, query, out);
        self.right.visit(path, query, out);
    }
}

impl<A: Api> Api for Query<A> {
    fn visit(&self, path: &[&'static str], query: &[&'static str], out: &mut Vec<EndpointInfo>) {
        let mut query = query.to_vec();
        query.push(self.name);
        self.inner.visit(path, &query, out)
    }
}
