// Configuration validation
//
// Rejects values the pager cannot work with and warns about ones it will
// silently adjust.

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &PagerConfig) -> Result<()> {
    validate_listing_config(&config.listing)?;
    validate_http_config(&config.http)?;

    if config.log.level.trim().is_empty() {
        bail!("log.level must not be empty");
    }

    Ok(())
}

fn validate_listing_config(config: &ListingConfig) -> Result<()> {
    let endpoint = config.endpoint.trim();
    if endpoint.is_empty() {
        bail!("listing.endpoint must not be empty");
    }
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        bail!(
            "listing.endpoint must be an absolute http(s) URL, got '{}'",
            endpoint
        );
    }

    if config.batch_size == 0 {
        bail!("listing.batch_size must be greater than 0");
    }
    if config.page_size == 0 {
        bail!("listing.page_size must be greater than 0");
    }

    if config.batch_size > MAX_BATCH_SIZE {
        warn!(
            batch_size = config.batch_size,
            max = MAX_BATCH_SIZE,
            "listing.batch_size exceeds the endpoint limit; it will be clamped"
        );
    }

    if let Err(e) = config.filters.validate() {
        bail!("listing.filters is invalid: {}", e);
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<()> {
    if config.timeout_secs == 0 {
        bail!("http.timeout_secs must be greater than 0");
    }
    Ok(())
}
