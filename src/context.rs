// Copyright (c) 2022 Espresso Systems (espressosys.com)
// This file is part of the Net library.

// This program is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
// You should have received a copy of the GNU General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Per-request state threaded through the interpreters.
//!
//! Neither context is ever shared: the server builds a [RemainingPath] for each incoming request
//! and the client clones a [ClientContext] into each generated operation.

use crate::error::{ClientError, InvalidBaseSnafu};
use itertools::Itertools;
use percent_encoding::percent_decode_str;
use snafu::OptionExt;
use std::fmt::{self, Debug, Formatter};
use tracing::{event, Level};
use url::Url;

/// The path segments of an incoming request which have not been matched yet.
///
/// Matching a segment never modifies the view; [strip](Self::strip) returns a narrower one.
pub struct RemainingPath<'a, S> {
    segments: &'a [S],
}

impl<'a, S: AsRef<str>> RemainingPath<'a, S> {
    pub fn new(segments: &'a [S]) -> Self {
        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Consume the leading segment if it is exactly `label`.
    pub fn strip(&self, label: &str) -> Option<Self> {
        match self.segments.split_first() {
            Some((first, rest)) if first.as_ref() == label => Some(Self { segments: rest }),
            _ => None,
        }
    }
}

impl<'a, S> Clone for RemainingPath<'a, S> {
    fn clone(&self) -> Self {
        Self {
            segments: self.segments,
        }
    }
}

impl<'a, S> Copy for RemainingPath<'a, S> {}

impl<'a, S: AsRef<str>> Debug for RemainingPath<'a, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.segments.iter().map(AsRef::as_ref))
            .finish()
    }
}

/// Split the path of a request URL into segments.
///
/// Each segment is percent-decoded, so it can be compared with a label as written in the
/// description. Empty segments are dropped: `/`, `//users` and `/users/` yield `[]`, `["users"]`
/// and `["users"]`. An encoded slash stays inside its segment, so `/a%2Fb` yields `["a/b"]`.
pub fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter(|segment| !segment.is_empty())
                .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// The request under construction by a client operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientContext {
    path: Vec<&'static str>,
    query: Vec<(String, Option<String>)>,
    body: Vec<u8>,
}

impl ClientContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a path label after those accumulated so far.
    pub fn push_segment(mut self, label: &'static str) -> Self {
        self.path.push(label);
        self
    }

    /// Declare a query parameter which has no value yet.
    pub fn declare_query(mut self, name: &str) -> Self {
        self.query.push((name.to_string(), None));
        self
    }

    /// Set the value of every declared query parameter called `name`.
    ///
    /// Setting `None` keeps the parameter declared but leaves it out of the request. A name which
    /// was never declared is ignored, so a misspelled parameter is not sent.
    pub fn set_query(mut self, name: &str, value: Option<String>) -> Self {
        let mut found = false;
        for (param, slot) in self.query.iter_mut() {
            if param == name {
                *slot = value.clone();
                found = true;
            }
        }
        if !found {
            event!(
                Level::WARN,
                "ignoring undeclared query parameter {:?} for /{}",
                name,
                self.relative_path()
            );
        }
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn path(&self) -> &[&'static str] {
        &self.path
    }

    pub fn query(&self) -> &[(String, Option<String>)] {
        &self.query
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The accumulated labels joined with `/`, outermost first.
    pub fn relative_path(&self) -> String {
        self.path.iter().join("/")
    }

    /// Append the accumulated labels to the path of `base` and attach the query parameters which
    /// have a value.
    ///
    /// The path of `base` is a prefix, with or without a trailing slash: `http://host/api` and
    /// `http://host/api/` both lead to `http://host/api/users`. Each label becomes exactly one
    /// path segment, percent-encoded as needed, so `?`, `#` and `/` inside a label never change
    /// the shape of the URL. The query and fragment of `base` are dropped.
    pub fn target(&self, base: &Url) -> Result<Url, ClientError> {
        let mut url = base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .ok()
            .context(InvalidBaseSnafu {
                base: base.as_str(),
            })?
            .pop_if_empty()
            .extend(&self.path);
        let present = self
            .query
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|value| (name, value)))
            .collect::<Vec<_>>();
        if !present.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in present {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_strip_consumes_one_segment() {
        let segments = ["users", "5"];
        let path = RemainingPath::new(&segments);
        assert!(path.strip("5").is_none());
        let rest = path.strip("users").unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(path.len(), 2);
        assert!(rest.strip("5").unwrap().is_empty());
        assert!(rest.strip("5").unwrap().strip("5").is_none());
    }

    #[test]
    fn test_path_segments_ignore_empty() {
        let url = Url::parse("http://localhost//users/5/?x=1").unwrap();
        assert_eq!(path_segments(&url), vec!["users", "5"]);
        let url = Url::parse("http://localhost/").unwrap();
        assert!(path_segments(&url).is_empty());
    }

    #[test]
    fn test_target_joins_path_and_query() {
        let base = Url::parse("http://localhost:8080/api/").unwrap();
        let ctx = ClientContext::new()
            .push_segment("users")
            .push_segment("active")
            .declare_query("limit")
            .declare_query("sort")
            .set_query("limit", Some("10".into()));
        assert_eq!(ctx.relative_path(), "users/active");
        assert_eq!(
            ctx.target(&base).unwrap().as_str(),
            "http://localhost:8080/api/users/active?limit=10"
        );
    }

    #[test]
    fn test_target_without_query() {
        let base = Url::parse("http://localhost:8080").unwrap();
        let ctx = ClientContext::new().declare_query("limit");
        assert_eq!(
            ctx.target(&base).unwrap().as_str(),
            "http://localhost:8080/"
        );
    }

    #[test]
    fn test_target_encodes_each_label_as_one_segment() {
        let base = Url::parse("http://localhost:8080/api?stale=1#frag").unwrap();
        let ctx = ClientContext::new()
            .push_segment("café")
            .push_segment("a b")
            .push_segment("a?b")
            .push_segment("a/b")
            .push_segment("50%");
        let target = ctx.target(&base).unwrap();
        assert_eq!(
            target.as_str(),
            "http://localhost:8080/api/caf%C3%A9/a%20b/a%3Fb/a%2Fb/50%25"
        );
        assert_eq!(
            path_segments(&target),
            vec!["api", "café", "a b", "a?b", "a/b", "50%"]
        );
    }

    #[test]
    fn test_path_segments_decode() {
        let url = Url::parse("http://localhost/caf%C3%A9/a%20b/a%2Fb").unwrap();
        assert_eq!(path_segments(&url), vec!["café", "a b", "a/b"]);
    }

    #[test]
    fn test_undeclared_query_is_not_sent() {
        let base = Url::parse("http://localhost/").unwrap();
        let ctx = ClientContext::new()
            .push_segment("search")
            .declare_query("q")
            .set_query("qq", Some("typo".into()));
        assert_eq!(ctx.query(), &[("q".to_string(), None)][..]);
        assert_eq!(
            ctx.target(&base).unwrap().as_str(),
            "http://localhost/search"
        );
    }

    #[test]
    fn test_target_rejects_opaque_base() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        let err = ClientContext::new()
            .push_segment("x")
            .target(&base)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidBase { .. }));
    }
}
