//! Reddit link extraction and resolution.
//!
//! Extraction uses a compile-time validated `lazy_regex!` pattern. Resolution follows
//! redirects with a HEAD request and strips tracking parameters; it is best-effort and
//! falls back to the original link on network failure.

#![allow(clippy::non_std_lazy_statics)]

use async_trait::async_trait;
use lazy_regex::lazy_regex;
use reqwest::redirect::Policy;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, warn};

/// Reddit post link. The host must directly follow the scheme so that lookalike hosts
/// (`notreddit.com`, `reddit.com.example.org`) never match.
static RE_REDDIT_LINK: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)\bhttps?://(?:www\.)?reddit\.com/r/\S+");

/// Maximum redirects followed while resolving a link
const MAX_REDIRECTS: usize = 10;

/// Find the first Reddit post link in free-form text.
///
/// # Examples
///
/// ```
/// use reddit_media_relay::link::extract_link;
/// let text = "check this out https://reddit.com/r/test/comments/abc/xyz?utm=1";
/// assert_eq!(
///     extract_link(text),
///     Some("https://reddit.com/r/test/comments/abc/xyz?utm=1")
/// );
/// assert_eq!(extract_link("hello"), None);
/// ```
#[must_use]
pub fn extract_link(text: &str) -> Option<&str> {
    RE_REDDIT_LINK.find(text).map(|m| m.as_str())
}

/// Drop query string and fragment, keeping scheme, host and path.
///
/// Input that is not an absolute URL is returned unchanged.
#[must_use]
pub fn canonicalize_link(link: &str) -> String {
    match Url::parse(link) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => link.to_string(),
    }
}

/// What a resolver does when the network lookup fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionFallback {
    /// Hand back the link exactly as it was received
    #[default]
    OriginalLink,
    /// Hand back the link with query and fragment stripped
    CanonicalLink,
}

impl ResolutionFallback {
    fn apply(self, link: &str) -> String {
        match self {
            Self::OriginalLink => link.to_string(),
            Self::CanonicalLink => canonicalize_link(link),
        }
    }
}

/// Turns a user-supplied link into the canonical link handed to the downloader
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Resolve `link`. Never fails; see [`ResolutionFallback`].
    async fn resolve(&self, link: &str) -> String;
}

/// Redirect-following resolver backed by `reqwest`
pub struct HttpLinkResolver {
    client: reqwest::Client,
    fallback: ResolutionFallback,
}

impl HttpLinkResolver {
    /// Create a resolver with the given request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (e.g. TLS backend failure).
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self::from_client(client))
    }

    /// Wrap an already configured client
    #[must_use]
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            fallback: ResolutionFallback::default(),
        }
    }

    /// Override the failure policy
    #[must_use]
    pub const fn with_fallback(mut self, fallback: ResolutionFallback) -> Self {
        self.fallback = fallback;
        self
    }
}

#[async_trait]
impl LinkResolver for HttpLinkResolver {
    async fn resolve(&self, link: &str) -> String {
        match self.client.head(link).send().await {
            Ok(response) => {
                let resolved = canonicalize_link(response.url().as_str());
                debug!(original = %link, resolved = %resolved, "Link resolved");
                resolved
            }
            Err(e) => {
                warn!(link = %link, error = %e, "Failed to resolve link, using fallback");
                self.fallback.apply(link)
            }
        }
    }
}
