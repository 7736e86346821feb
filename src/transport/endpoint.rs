//! Endpoint resolution.
//!
//! The event stream lives next to the HTTP API: same host, port 8000, path
//! `/ws/chunks`. Loopback names collapse to `localhost` so that certificates
//! issued for `localhost` keep working when the app is opened via `127.0.0.1`.

use url::Url;

use crate::config::EndpointSettings;
use crate::utils::error::ClientError;

/// Builds the WebSocket URL described by `settings`.
pub fn resolve_url(settings: &EndpointSettings) -> String {
    if let Some(url) = settings.url.as_deref().filter(|url| !url.trim().is_empty()) {
        return url.trim().to_string();
    }

    let scheme = if settings.secure { "wss" } else { "ws" };
    let path = if settings.path.starts_with('/') {
        settings.path.clone()
    } else {
        format!("/{}", settings.path)
    };

    format!(
        "{scheme}://{}:{}{path}",
        resolve_host(&settings.host),
        settings.port
    )
}

pub fn resolve_host(host: &str) -> &str {
    match host {
        "localhost" | "127.0.0.1" => "localhost",
        other => other,
    }
}

/// Validates an endpoint, converting `http(s)` to `ws(s)`.
///
/// Errors are terminal: a malformed endpoint will not get better by retrying.
pub fn parse_endpoint(raw: &str) -> Result<Url, ClientError> {
    let invalid = |reason: String| ClientError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    };
    if url.scheme() != scheme {
        url.set_scheme(scheme)
            .map_err(|_| invalid(format!("cannot switch scheme to `{scheme}`")))?;
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

/// Canonical form used to key shared connections; falls back to the raw
/// string when the endpoint does not parse.
pub fn normalize(raw: &str) -> String {
    parse_endpoint(raw)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| raw.trim().to_string())
}
