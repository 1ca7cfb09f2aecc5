// Initialization utilities
//
// Logging setup and wiring a configured story listing

use crate::session::{ListingOptions, PagedListing};
use crate::story::{Story, StoryQuery};
use anyhow::{Context, Result};
use std::sync::Arc;
use storypager_config::{AuthConfig, HttpConfig, LogConfig, LogFormat, PagerConfig};
use storypager_http::{
    BearerToken, HeadersProvider, NoHeaders, ReqwestHttpClient, DEFAULT_USER_AGENT,
};
use tracing::{info, warn};

/// Initialize tracing/logging from LogConfig
pub fn init_tracing(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr; stdout carries listing output
    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already installed (idempotent)
    let _ = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}

pub fn build_http_client(config: &HttpConfig) -> Result<ReqwestHttpClient> {
    let user_agent = config
        .user_agent
        .as_deref()
        .unwrap_or(DEFAULT_USER_AGENT);
    ReqwestHttpClient::with_options(config.timeout(), user_agent)
        .context("Failed to build HTTP client")
}

pub fn headers_provider(config: &AuthConfig) -> Arc<dyn HeadersProvider> {
    match config.bearer_token.as_deref() {
        Some(token) if !token.trim().is_empty() => Arc::new(BearerToken::new(token.trim())),
        _ => Arc::new(NoHeaders),
    }
}

pub fn listing_options(config: &PagerConfig) -> ListingOptions {
    ListingOptions {
        page_size: config.listing.page_size,
        batch_size: config.listing.batch_size,
        prefetch_threshold: config.listing.prefetch_threshold,
        filters: config.listing.filters.clone(),
    }
}

/// Open a story listing for `query` and load its first batch.
pub async fn open_stories(config: &PagerConfig, query: &StoryQuery) -> Result<PagedListing<Story>> {
    if query.requires_auth() && config.auth.bearer_token.is_none() {
        warn!(?query, "no bearer token configured; this listing will answer 401");
    }

    let http = build_http_client(&config.http)?;
    let endpoint = query.endpoint(&config.listing.endpoint);
    let mut options = listing_options(config);
    options.filters = query.filters(&options.filters);

    info!(
        endpoint = %endpoint,
        filters = %options.filters.serialized(),
        page_size = options.page_size,
        "opening story listing"
    );

    PagedListing::open(http, &endpoint, options, headers_provider(&config.auth))
        .await
        .with_context(|| format!("Failed to open listing at {}", endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_headers_provider_from_auth_config() {
        let none = headers_provider(&AuthConfig::default());
        assert!(none.headers().await.unwrap().is_empty());

        let blank = headers_provider(&AuthConfig {
            bearer_token: Some("  ".to_string()),
        });
        assert!(blank.headers().await.unwrap().is_empty());

        let bearer = headers_provider(&AuthConfig {
            bearer_token: Some("abc".to_string()),
        });
        assert_eq!(
            bearer.headers().await.unwrap(),
            vec![("Authorization".to_string(), "Bearer abc".to_string())]
        );
    }

    #[test]
    fn test_listing_options_follow_config() {
        let config = PagerConfig::from_toml(
            r#"
            [listing]
            page_size = 20
            batch_size = 40
            prefetch_threshold = 2
            [listing.filters]
            category = "poetry"
            "#,
        )
        .unwrap();

        let options = listing_options(&config);
        assert_eq!(options.page_size, 20);
        assert_eq!(options.batch_size, 40);
        assert_eq!(options.prefetch_threshold, 2);
        assert_eq!(options.filters.serialized(), "category=poetry");
    }
}
