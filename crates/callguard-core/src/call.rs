//! The immutable description of one outbound call.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Header sent when a call carries no headers of its own.
pub const DEFAULT_CONTENT_TYPE: (&str, &str) = ("Content-Type", "application/json");

/// HTTP-style method of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Method {
    /// `GET`
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Canonical upper-case spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a method outside GET, POST, PUT and DELETE.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported method `{0}`; expected GET, POST, PUT or DELETE")]
pub struct ParseMethodError(pub String);

impl FromStr for Method {
    type Err = ParseMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            _ => Err(ParseMethodError(s.to_string())),
        }
    }
}

/// Everything the transport needs to perform one call.
///
/// A descriptor is built once and then shared read-only between attempts.
/// The `destination` is the logical key used for circuit breaking; when not
/// set explicitly it is `scheme://host[:port]` of the target, so every route on
/// one host shares a breaker. Default ports of `http` and `https` are omitted.
///
/// ```rust
/// use callguard_core::{CallDescriptor, Method};
/// use std::time::Duration;
///
/// let url = "https://api.example.com/v1/orders".parse().unwrap();
/// let call = CallDescriptor::new(Method::Post, url)
///     .payload(br#"{"sku":"A-1"}"#.to_vec())
///     .timeout(Duration::from_secs(2));
///
/// assert_eq!(call.destination_key(), "https://api.example.com");
/// assert_eq!(call.timeout_override(), Some(Duration::from_secs(2)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    destination: String,
    method: Method,
    target: Url,
    payload: Option<Vec<u8>>,
    headers: BTreeMap<String, String>,
    timeout: Option<Duration>,
    follow_redirects: bool,
}

// `Url::origin` is opaque ("null") for schemes like redis or amqp, which
// would fold every such host into one circuit.
fn destination_of(target: &Url) -> String {
    match (target.host_str(), target.port()) {
        (Some(host), Some(port)) => format!("{}://{host}:{port}", target.scheme()),
        (Some(host), None) => format!("{}://{host}", target.scheme()),
        (None, _) => target.as_str().to_string(),
    }
}

impl CallDescriptor {
    /// Describes a call of `method` against `target`.
    pub fn new(method: Method, target: Url) -> Self {
        Self {
            destination: destination_of(&target),
            method,
            target,
            payload: None,
            headers: BTreeMap::new(),
            timeout: None,
            follow_redirects: true,
        }
    }

    /// Shorthand for a `GET` with no payload.
    pub fn get(target: Url) -> Self {
        Self::new(Method::Get, target)
    }

    /// Overrides the breaker key, e.g. to group routes or split one host.
    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Sets the request body.
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Adds a header, replacing any previous value for the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Per-call attempt timeout, overriding the caller's default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Whether the transport should follow redirects. Default: true.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// The logical breaker key.
    pub fn destination_key(&self) -> &str {
        &self.destination
    }

    /// The call's method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The full target URL.
    pub fn target(&self) -> &Url {
        &self.target
    }

    /// The request body, if any.
    pub fn body(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Headers to send. A call without explicit headers sends
    /// `Content-Type: application/json`.
    pub fn headers(&self) -> BTreeMap<String, String> {
        if self.headers.is_empty() {
            let (name, value) = DEFAULT_CONTENT_TYPE;
            BTreeMap::from([(name.to_string(), value.to_string())])
        } else {
            self.headers.clone()
        }
    }

    /// The per-call timeout override, if one was set.
    pub fn timeout_override(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resolves the attempt timeout against the caller's default.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout.unwrap_or(default)
    }

    /// Whether redirects should be followed.
    pub fn follows_redirects(&self) -> bool {
        self.follow_redirects
    }
}
