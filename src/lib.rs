// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! # Declarative web API descriptions.
//!
//! The shape of an API is written once, as a value built from the combinators in [api]: literal
//! path segments, ordered alternatives, and GET or POST leaf endpoints which name the types they
//! exchange. Two interpreters derive everything else from that value:
//!
//! * [Router] pairs the description with a handler for every leaf and dispatches requests to
//!   them. The handler tree must have the same shape as the description, which the compiler
//!   checks. [server::server] wraps a router in a `tide` server which answers 404 when no route
//!   matches.
//! * [client::client] pairs the description with a shared [Transport] (a `surf` client) and
//!   returns one callable operation per leaf, which builds the matching request, checks the
//!   status and decodes the body.
//!
//! Bodies are JSON. Successful GET requests are answered with 200 and successful POST requests
//! with 201; handler failures are answered with the status and message the handler chose. A
//! client and a server derived from the same description therefore agree on routes, methods and
//! payload types by construction.

pub mod api;
pub mod client;
pub mod context;
pub mod error;
pub mod router;
pub mod server;

pub use api::{alt, get, post, query, segment, Api, Method};
pub use client::{client, Transport, TransportConfig};
pub use error::*;
pub use router::{Handler, HandlerResult, Routable, Router};
