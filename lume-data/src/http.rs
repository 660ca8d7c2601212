//! Shared plumbing for the HTTP collaborators.

use std::time::Duration;

use log::debug;
use lume_core::LookupError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

/// Default user agent sent to every service.
pub const DEFAULT_USER_AGENT: &str = "lume/0.1";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Failures while constructing an HTTP collaborator.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// The configured base URL is unusable.
    #[error("invalid base URL {url:?}: {reason}")]
    BaseUrl { url: String, reason: String },
}

pub(crate) fn build_client(
    user_agent: &str,
    timeout: Duration,
) -> Result<Client, ClientBuildError> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(ClientBuildError::HttpClient)
}

/// Parse `base_url` and make sure paths can be appended to it.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, ClientBuildError> {
    let url = Url::parse(base_url).map_err(|err| ClientBuildError::BaseUrl {
        url: base_url.to_owned(),
        reason: err.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ClientBuildError::BaseUrl {
            url: base_url.to_owned(),
            reason: "URL cannot carry a path".to_owned(),
        });
    }
    Ok(url)
}

/// Map a transport failure onto the shared lookup error.
pub(crate) fn convert_reqwest_error(
    error: &reqwest::Error,
    url: &str,
    timeout: Duration,
) -> LookupError {
    if error.is_timeout() {
        return LookupError::Timeout {
            url: url.to_owned(),
            timeout_secs: timeout.as_secs(),
        };
    }

    if let Some(status) = error.status() {
        return LookupError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    LookupError::Network {
        url: url.to_owned(),
        message: error.to_string(),
    }
}

/// GET `url` and decode the JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: Url,
    timeout: Duration,
) -> Result<T, LookupError> {
    let url_text = url.to_string();
    debug!("GET {url_text}");
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| convert_reqwest_error(&err, &url_text, timeout))?
        .error_for_status()
        .map_err(|err| convert_reqwest_error(&err, &url_text, timeout))?;

    response.json().await.map_err(|err| LookupError::Parse {
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://localhost:5000")]
    #[case("https://example.com/osrm/")]
    fn accepts_hierarchical_urls(#[case] base: &str) {
        assert!(parse_base_url(base).is_ok());
    }

    #[rstest]
    #[case("not a url")]
    #[case("mailto:someone@example.com")]
    fn rejects_unusable_urls(#[case] base: &str) {
        let err = parse_base_url(base).expect_err("base URL is unusable");
        assert!(matches!(err, ClientBuildError::BaseUrl { .. }));
    }
}
