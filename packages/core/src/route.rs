//! Route annotation grammar: `[VERB] PATH [TITLE...]`.
//!
//! A node declares its route as a single whitespace-separated string.
//! Zero tokens mean the root path `/`. With one token, that token is the
//! path. With two or more, the first token is taken as the verb when it
//! case-insensitively matches one of the nine standard HTTP verbs or the
//! wildcard `ALL`; otherwise it is the path and everything after it is
//! free-text title.

use std::fmt;

use crate::error::RouteError;

/// HTTP verb restriction for a route, or `All` for any verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Connect,
    Options,
    Trace,
    /// Wildcard: the route answers every verb. This is the default when
    /// the annotation carries no verb token.
    All,
}

impl Verb {
    /// Parses a verb token case-insensitively. Returns `None` for tokens
    /// that are not one of the nine standard verbs or `ALL`.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let verb = match token.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "HEAD" => Self::Head,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "CONNECT" => Self::Connect,
            "OPTIONS" => Self::Options,
            "TRACE" => Self::Trace,
            "ALL" => Self::All,
            _ => return None,
        };
        Some(verb)
    }

    /// Canonical upper-case token for this verb.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::All => "ALL",
        }
    }
}

/// Parsed form of a route annotation: the `(verb, path, title)` triple.
///
/// `parse` followed by `Display` followed by `parse` is idempotent on the
/// triple: the first parse normalizes verb case and collapses title
/// whitespace, after which the representation is a fixed point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub verb: Verb,
    pub path: String,
    pub title: String,
}

impl RouteSpec {
    /// Parses a route annotation string.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::BadPath`] when the token chosen as the path
    /// does not begin with `/`.
    pub fn parse(annotation: &str) -> Result<Self, RouteError> {
        let mut tokens = annotation.split_whitespace();

        let Some(first) = tokens.next() else {
            return Ok(Self {
                verb: Verb::All,
                path: "/".to_string(),
                title: String::new(),
            });
        };

        let (verb, path) = match tokens.clone().next() {
            // Two or more tokens: the first is a verb only when it parses
            // as one, otherwise it is the path and the rest is title.
            Some(second) => match Verb::from_token(first) {
                Some(verb) => {
                    tokens.next();
                    (verb, second)
                }
                None => (Verb::All, first),
            },
            // Single token: always the path, even if it spells a verb.
            None => (Verb::All, first),
        };

        if !path.starts_with('/') {
            return Err(RouteError::BadPath {
                annotation: annotation.to_string(),
                path: path.to_string(),
            });
        }

        Ok(Self {
            verb,
            path: path.to_string(),
            title: tokens.collect::<Vec<_>>().join(" "),
        })
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.verb != Verb::All {
            write!(f, "{} ", self.verb.as_str())?;
        }
        f.write_str(&self.path)?;
        if !self.title.is_empty() {
            write!(f, " {}", self.title)?;
        }
        Ok(())
    }
}

/// Joins an ancestor path prefix with a node's own declared path.
///
/// `/` as either side contributes nothing; double slashes at the join
/// point are collapsed so `/admin` + `/users` yields `/admin/users`.
#[must_use]
pub fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }
    } else {
        format!("{prefix}/{path}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_annotation_is_root_path() {
        let spec = RouteSpec::parse("").unwrap();
        assert_eq!(spec.verb, Verb::All);
        assert_eq!(spec.path, "/");
        assert_eq!(spec.title, "");
    }

    #[test]
    fn single_token_is_bare_path() {
        let spec = RouteSpec::parse("/about").unwrap();
        assert_eq!(spec.verb, Verb::All);
        assert_eq!(spec.path, "/about");
        assert_eq!(spec.title, "");
    }

    #[test]
    fn verb_path_title() {
        let spec = RouteSpec::parse("GET /users/{id} User detail").unwrap();
        assert_eq!(spec.verb, Verb::Get);
        assert_eq!(spec.path, "/users/{id}");
        assert_eq!(spec.title, "User detail");
    }

    #[test]
    fn verb_is_case_insensitive() {
        let spec = RouteSpec::parse("delete /items/{id}").unwrap();
        assert_eq!(spec.verb, Verb::Delete);
        assert_eq!(spec.path, "/items/{id}");
    }

    #[test]
    fn non_verb_first_token_is_path_with_title() {
        let spec = RouteSpec::parse("/about Company history").unwrap();
        assert_eq!(spec.verb, Verb::All);
        assert_eq!(spec.path, "/about");
        assert_eq!(spec.title, "Company history");
    }

    #[test]
    fn single_verb_like_token_is_a_path_and_fails() {
        // One token is always the path; "GET" does not start with '/'.
        let err = RouteSpec::parse("GET").unwrap_err();
        assert!(matches!(err, RouteError::BadPath { .. }));
    }

    #[test]
    fn verb_with_non_slash_path_fails() {
        let err = RouteSpec::parse("POST users").unwrap_err();
        assert!(matches!(err, RouteError::BadPath { path, .. } if path == "users"));
    }

    #[test]
    fn all_verb_round_trips_without_verb_token() {
        let spec = RouteSpec::parse("ALL /x Some title").unwrap();
        assert_eq!(spec.to_string(), "/x Some title");
        let again = RouteSpec::parse(&spec.to_string()).unwrap();
        assert_eq!(spec, again);
    }

    #[test]
    fn join_paths_collapses_slashes() {
        assert_eq!(join_paths("/", "/about"), "/about");
        assert_eq!(join_paths("/admin", "/users"), "/admin/users");
        assert_eq!(join_paths("/admin/", "/users/{id}"), "/admin/users/{id}");
        assert_eq!(join_paths("/admin", "/"), "/admin");
        assert_eq!(join_paths("/", "/"), "/");
    }

    proptest! {
        /// parse -> Display -> parse is a fixed point on the triple.
        #[test]
        fn parse_display_parse_is_idempotent(
            verb in prop::sample::select(vec![
                Verb::Get, Verb::Head, Verb::Post, Verb::Put, Verb::Patch,
                Verb::Delete, Verb::Connect, Verb::Options, Verb::Trace, Verb::All,
            ]),
            segs in prop::collection::vec("[a-z]{1,8}", 0..4),
            title in "( ?[A-Za-z]{1,8}){0,3}",
        ) {
            let path = format!("/{}", segs.join("/"));
            let spec = RouteSpec {
                verb,
                path,
                title: title.split_whitespace().collect::<Vec<_>>().join(" "),
            };
            let reparsed = RouteSpec::parse(&spec.to_string()).unwrap();
            prop_assert_eq!(spec, reparsed);
        }
    }
}
