// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

use snafu::Snafu;
use std::fmt::{self, Display, Formatter};

/// An explicit failure returned by endpoint logic.
///
/// The router renders a [HandlerError] verbatim: the status code becomes the status of the
/// response and the message becomes its body, with no declared content type. Handler failures
/// are ordinary responses, not routing errors; in particular they never cause the router to
/// try another alternative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerError {
    status: u16,
    message: String,
}

impl HandlerError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("unable to serialize response: {}", err))
    }
}

/// Errors produced by a generated client operation.
///
/// Every expected failure of a remote call is reported as a value of this type; the [Display]
/// implementation is the human-readable error description. Wrong statuses and undecodable bodies
/// are kept apart so callers can distinguish a server that refused the request from one that
/// answered with something other than the declared type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClientError {
    #[snafu(display("transport error: {}", message))]
    Transport { message: String },

    #[snafu(display("unexpected status {} (expected {}): {}", status, expected, message))]
    UnexpectedStatus {
        status: u16,
        expected: u16,
        message: String,
    },

    #[snafu(display("invalid response body: {}", source))]
    InvalidResponseBody { source: serde_json::Error },

    #[snafu(display("base address {} can not carry a path", base))]
    InvalidBase { base: String },

    #[snafu(display("unable to encode request body: {}", source))]
    EncodeBody { source: serde_json::Error },
}

impl ClientError {
    /// Wrap an error from the underlying HTTP client.
    ///
    /// [surf::Error] does not implement [std::error::Error], so it is captured by its message.
    pub fn transport(err: surf::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }

    /// The status of the response which caused this error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::new(418, "short and stout");
        assert_eq!(err.status(), 418);
        assert_eq!(err.message(), "short and stout");
        assert_eq!(err.to_string(), "418: short and stout");
        assert_eq!(HandlerError::bad_request("x").status(), 400);
        assert_eq!(HandlerError::not_found("x").status(), 404);
    }

    #[test]
    fn test_client_error_messages() {
        let err = ClientError::UnexpectedStatus {
            status: 503,
            expected: 200,
            message: "down".into(),
        };
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("503"));

        let source = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = ClientError::InvalidResponseBody { source };
        assert_eq!(err.status(), None);
        assert!(err.to_string().starts_with("invalid response body"));
    }
}
