//! Place summaries from Wikipedia.
//!
//! [`WikipediaDescriber`] implements [`lume_core::PlaceDescriber`]. For each
//! language, preferred first, it asks the REST summary endpoint for a page
//! titled exactly like the place. If that fails it searches the wiki and
//! summarises the first hit. The first language with a non-empty summary
//! wins.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use lume_core::{LookupError, PlaceDescriber, PlaceDescription};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::http::{
    ClientBuildError, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, build_client, get_json, parse_base_url,
};

/// Placeholder replaced by the language code in [`WikipediaConfig::base_url`].
pub const LANGUAGE_PLACEHOLDER: &str = "{lang}";

/// Public Wikipedia site, one host per language.
pub const DEFAULT_WIKIPEDIA_URL: &str = "https://{lang}.wikipedia.org";

/// Languages tried after the preferred one.
pub const DEFAULT_LANGUAGES: &[&str] = &["de", "en"];

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    extract: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

impl SearchResponse {
    fn first_title(self) -> Option<String> {
        self.query?.search.into_iter().next().map(|hit| hit.title)
    }
}

/// Configuration for [`WikipediaDescriber`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikipediaConfig {
    /// Site URL; [`LANGUAGE_PLACEHOLDER`] is replaced per language.
    pub base_url: String,
    /// Language asked first.
    pub preferred_language: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string; Wikimedia asks clients to identify themselves.
    pub user_agent: String,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WIKIPEDIA_URL.to_owned(),
            preferred_language: "de".to_owned(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl WikipediaConfig {
    /// Create a new configuration with the given site URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Ask `language` before the defaults.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.preferred_language = language.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Languages in the order they are asked, without duplicates.
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        let preferred = self.preferred_language.trim().to_lowercase();
        let mut languages = Vec::with_capacity(DEFAULT_LANGUAGES.len() + 1);
        if !preferred.is_empty() {
            languages.push(preferred);
        }
        for language in DEFAULT_LANGUAGES {
            if !languages.iter().any(|known| known == language) {
                languages.push((*language).to_owned());
            }
        }
        languages
    }
}

/// One language edition of the configured site.
#[derive(Debug, Clone)]
struct Edition {
    language: String,
    base: Url,
}

impl Edition {
    fn summary_url(&self, title: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "rest_v1", "page", "summary", title]);
        }
        url
    }

    fn search_url(&self, query: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["w", "api.php"]);
        }
        url.query_pairs_mut()
            .append_pair("action", "query")
            .append_pair("list", "search")
            .append_pair("srsearch", query)
            .append_pair("srlimit", "1")
            .append_pair("utf8", "1")
            .append_pair("format", "json");
        url
    }
}

/// Place describer backed by the Wikipedia REST and search APIs.
#[derive(Debug, Clone)]
pub struct WikipediaDescriber {
    client: Client,
    editions: Vec<Edition>,
    config: WikipediaConfig,
}

impl WikipediaDescriber {
    /// Create a describer against the public site.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self, ClientBuildError> {
        Self::with_config(WikipediaConfig::default())
    }

    /// Create a describer with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the site URL is unusable for any language or the
    /// HTTP client fails to build.
    pub fn with_config(config: WikipediaConfig) -> Result<Self, ClientBuildError> {
        let editions = config
            .languages()
            .into_iter()
            .map(|language| {
                let site = config.base_url.replace(LANGUAGE_PLACEHOLDER, &language);
                let base = parse_base_url(&site)?;
                Ok(Edition { language, base })
            })
            .collect::<Result<Vec<_>, ClientBuildError>>()?;
        let client = build_client(&config.user_agent, config.timeout)?;
        Ok(Self {
            client,
            editions,
            config,
        })
    }

    async fn summary(&self, edition: &Edition, title: &str) -> Result<String, LookupError> {
        let url = edition.summary_url(title);
        let summary: Summary = get_json(&self.client, url, self.config.timeout).await?;
        non_empty(title, &summary.extract)
    }

    async fn describe_in(&self, edition: &Edition, name: &str) -> Result<String, LookupError> {
        match self.summary(edition, name).await {
            Ok(summary) => return Ok(summary),
            Err(err) => debug!("no {} page titled {name:?}: {err}", edition.language),
        }
        let url = edition.search_url(name);
        let response: SearchResponse = get_json(&self.client, url, self.config.timeout).await?;
        let title = response.first_title().ok_or_else(|| LookupError::NotFound {
            query: name.to_owned(),
        })?;
        self.summary(edition, &title).await
    }
}

fn non_empty(title: &str, extract: &str) -> Result<String, LookupError> {
    let extract = extract.trim();
    if extract.is_empty() {
        return Err(LookupError::NotFound {
            query: title.to_owned(),
        });
    }
    Ok(extract.to_owned())
}

#[async_trait]
impl PlaceDescriber for WikipediaDescriber {
    async fn describe(&self, name: &str) -> Result<PlaceDescription, LookupError> {
        for edition in &self.editions {
            match self.describe_in(edition, name).await {
                Ok(summary) => {
                    return Ok(PlaceDescription {
                        summary,
                        language: edition.language.clone(),
                    });
                }
                Err(err) => debug!("no {} summary for {name:?}: {err}", edition.language),
            }
        }
        Err(LookupError::NotFound {
            query: name.to_owned(),
        })
    }
}
