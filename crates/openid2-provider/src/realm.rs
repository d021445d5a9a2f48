#![forbid(unsafe_code)]

//! Realm parsing and return URL matching.
//!
//! A realm is the URL pattern a relying party declares for itself. A signed
//! assertion is only ever redirected to a `return_to` the realm matches.

use openid2_core::{Error, Result};
use std::fmt;
use std::str::FromStr;
use url::{Host, Url};

/// A parsed realm.
///
/// A wildcard realm (`http://*.example.com/`) keeps its host with the
/// leading dot (`.example.com`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realm {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    wildcard: bool,
}

impl Realm {
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = |why: &str| Error::MalformedRealm(format!("{why}: {raw}"));

        let (scheme, rest) = raw.split_once("://").ok_or_else(|| malformed("no scheme"))?;
        let (rest, wildcard) = match rest.strip_prefix("*.") {
            Some(rest) => (rest, true),
            None => (rest, false),
        };
        // The URL parser skips extra slashes after the scheme and would
        // promote the first path segment to the host.
        if rest.starts_with(['/', '\\']) {
            return Err(malformed("empty host"));
        }

        let url = Url::parse(&format!("{scheme}://{rest}"))
            .map_err(|e| Error::MalformedRealm(format!("{raw}: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(malformed("scheme must be http or https"));
        }
        if url.fragment().is_some() {
            return Err(malformed("fragment not allowed"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(malformed("userinfo not allowed"));
        }

        let host = match url.host() {
            Some(Host::Domain(d)) if d.contains('*') => {
                return Err(malformed("wildcard must be the leading label"))
            }
            Some(Host::Domain(d)) if !d.is_empty() => d.to_owned(),
            Some(_) if !wildcard => url.host_str().unwrap_or_default().to_owned(),
            Some(_) => return Err(malformed("wildcard on an address")),
            None => return Err(malformed("empty host")),
        };
        if host.is_empty() {
            return Err(malformed("empty host"));
        }

        Ok(Self {
            scheme: url.scheme().to_owned(),
            host: if wildcard { format!(".{host}") } else { host },
            port: url.port(),
            path: url.path().to_owned(),
            query: trimmed_query(&url).to_owned(),
            wildcard,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit non-default port.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Whether `candidate` is a URL this realm covers.
    ///
    /// The candidate goes through the same URL parser that builds the
    /// redirect, so the host checked here is the host the user agent is
    /// sent to. Any fragment on the candidate is ignored.
    pub fn validate(&self, candidate: &str) -> bool {
        let Ok(url) = Url::parse(candidate) else {
            return false;
        };
        if url.scheme() != self.scheme
            || !url.username().is_empty()
            || url.password().is_some()
        {
            return false;
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        if host.is_empty() || host.contains('*') {
            return false;
        }
        let host_ok = if self.wildcard {
            host.ends_with(&self.host)
        } else {
            host == self.host
        };
        if !host_ok || url.port_or_known_default() != self.effective_port() {
            return false;
        }

        let path = url.path();
        let query = trimmed_query(&url);
        if path == self.path {
            if query == self.query || self.query.is_empty() {
                return true;
            }
            // ?foo=bar covers ?foo=bar&x=y but not ?foo=barbaz
            return query
                .strip_prefix(self.query.as_str())
                .is_some_and(|rest| rest.starts_with('&'));
        }

        if !self.query.is_empty() {
            return false;
        }
        // /abc covers /abc/def but not /abcdef
        path.strip_prefix(self.path.as_str())
            .is_some_and(|rest| self.path.ends_with('/') || rest.starts_with('/'))
    }

    fn effective_port(&self) -> Option<u16> {
        self.port.or(match self.scheme.as_str() {
            "https" => Some(443),
            _ => Some(80),
        })
    }
}

impl FromStr for Realm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Realm::parse(s)
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if self.wildcard {
            f.write_str("*")?;
        }
        f.write_str(&self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        f.write_str(&self.path)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query)?;
        }
        Ok(())
    }
}

/// The query without one trailing `&`.
fn trimmed_query(url: &Url) -> &str {
    let query = url.query().unwrap_or_default();
    query.strip_suffix('&').unwrap_or(query)
}
