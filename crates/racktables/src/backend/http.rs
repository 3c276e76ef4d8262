//! HTTP backend for api.php.
//!
//! Every call is a GET on the configured endpoint with HTTP Basic
//! credentials. Non-200 answers are returned to the caller untouched so the
//! client can decide whether they are fatal.

use crate::backend::{Backend, Response};
use crate::error::Result;
use crate::request::Request;
use crate::types::Credentials;
use base64::{Engine, engine::general_purpose::STANDARD};

const USER_AGENT: &str = concat!("racktables-rs/", env!("CARGO_PKG_VERSION"));

/// Maximum response size. A `get_depot` with attributes for a few thousand
/// objects runs well past ureq's 10 MB default.
const MAX_BODY_SIZE: u64 = 256 * 1024 * 1024;

/// Blocking api.php backend over ureq.
pub struct HttpBackend {
    /// HTTP agent, reused across calls.
    agent: ureq::Agent,
    /// Endpoint without a trailing `?`.
    api_url: String,
    /// Precomputed `Authorization` header value.
    authorization: String,
}

impl HttpBackend {
    /// Create a backend for `api_url` authenticating as `credentials`.
    #[must_use]
    pub fn new(api_url: &str, credentials: &Credentials) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            api_url: normalize_api_url(api_url),
            authorization: basic_auth(credentials),
        }
    }

    /// The endpoint requests are sent to.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl Backend for HttpBackend {
    fn send(&self, request: &Request) -> Result<Response> {
        log::debug!("GET {} {}", self.api_url, request);

        let mut builder = self
            .agent
            .get(&self.api_url)
            .header("Authorization", &self.authorization)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);

        for (key, value) in request.query() {
            builder = builder.query(key, value);
        }

        let mut response = builder.call()?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_string()?;

        log::trace!("{} -> HTTP {} ({} bytes)", request.method(), status, body.len());

        Ok(Response { status, body })
    }
}

/// Strip the query separator left on URLs copied from a browser
/// (`.../api.php?`).
fn normalize_api_url(url: &str) -> String {
    url.trim().trim_end_matches(['?', '&']).to_string()
}

fn basic_auth(credentials: &Credentials) -> String {
    let pair = format!("{}:{}", credentials.username, credentials.password);
    format!("Basic {}", STANDARD.encode(pair))
}
