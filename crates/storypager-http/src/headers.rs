//! Request header providers
//!
//! Headers are resolved right before each request so short-lived tokens can be
//! refreshed by the provider. A provider that fails aborts the fetch; one that
//! returns no headers lets it proceed unauthenticated.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait HeadersProvider: Send + Sync {
    async fn headers(&self) -> Result<Vec<(String, String)>>;
}

/// Sends no extra headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeaders;

#[async_trait]
impl HeadersProvider for NoHeaders {
    async fn headers(&self) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}

/// Fixed set of headers.
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders(pub Vec<(String, String)>);

#[async_trait]
impl HeadersProvider for StaticHeaders {
    async fn headers(&self) -> Result<Vec<(String, String)>> {
        Ok(self.0.clone())
    }
}

/// `Authorization: Bearer <token>`
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[async_trait]
impl HeadersProvider for BearerToken {
    async fn headers(&self) -> Result<Vec<(String, String)>> {
        Ok(vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.0),
        )])
    }
}

/// Synchronous closure provider, e.g. reading a token cache.
pub struct FnHeaders<F>(pub F);

#[async_trait]
impl<F> HeadersProvider for FnHeaders<F>
where
    F: Fn() -> Result<Vec<(String, String)>> + Send + Sync,
{
    async fn headers(&self) -> Result<Vec<(String, String)>> {
        (self.0)()
    }
}
