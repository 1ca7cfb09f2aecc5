//! Single listing fetch
//!
//! Builds the request URL, resolves headers, issues one GET and classifies the
//! response. No retries and no buffer mutation happen here.

use crate::envelope::{decode_envelope, Envelope};
use crate::error::{EndpointError, FetchError};
use crate::headers::HeadersProvider;
use crate::http::HttpClient;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use storypager_core::math;
use storypager_core::RequestFilters;
use tracing::{debug, instrument, warn};
use url::Url;

/// Result of one successful fetch.
pub type FetchedBatch<T> = Envelope<T>;

pub struct FetchGate<C: HttpClient> {
    http: C,
    endpoint: Url,
    batch_size: u32,
    headers: Arc<dyn HeadersProvider>,
}

impl<C: HttpClient> FetchGate<C> {
    /// Validate the endpoint and clamp the batch size.
    pub fn new(
        http: C,
        endpoint: &str,
        requested_batch_size: u32,
        headers: Arc<dyn HeadersProvider>,
    ) -> Result<Self, EndpointError> {
        let endpoint = parse_endpoint(endpoint)?;
        Ok(Self {
            http,
            endpoint,
            batch_size: math::effective_batch_size(requested_batch_size),
            headers,
        })
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// `{endpoint}?skip=..&limit=..&{filters}`. Existing query parameters on
    /// the endpoint are kept.
    pub fn request_url(&self, offset: u64, filters: &RequestFilters) -> String {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("skip", &offset.to_string());
            query.append_pair("limit", &self.batch_size.to_string());
            for (key, value) in filters.defined() {
                query.append_pair(key, &value.to_string());
            }
        }
        url.into()
    }

    #[instrument(skip(self, filters), fields(filters = %filters.serialized()))]
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        offset: u64,
        filters: &RequestFilters,
    ) -> Result<FetchedBatch<T>, FetchError> {
        let mut headers = self
            .headers
            .headers()
            .await
            .map_err(|e| FetchError::AuthResolution(format!("{:#}", e)))?;

        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("accept")) {
            headers.push(("Accept".to_string(), "application/json".to_string()));
        }

        let url = self.request_url(offset, filters);
        debug!(%url, "fetching listing batch");

        let response = self
            .http
            .get(&url, headers)
            .await
            .map_err(|e| FetchError::Transport(format!("{:#}", e)))?;

        if response.status == 401 {
            return Err(FetchError::Unauthorized);
        }
        if !response.is_success() {
            return Err(FetchError::Http {
                status: response.status,
            });
        }

        let envelope: Envelope<T> = decode_envelope(&response.body).map_err(|err| {
            match (err, response.header("content-type")) {
                (FetchError::Transport(msg), Some(content_type)) => {
                    FetchError::Transport(format!("{} (content-type: {})", msg, content_type))
                }
                (err, _) => err,
            }
        })?;
        if envelope.total_inferred && envelope.items.len() >= self.batch_size as usize {
            warn!(
                offset,
                items = envelope.items.len(),
                "listing response has no total; inferring it from a full batch under-counts"
            );
        }
        debug!(
            offset,
            items = envelope.items.len(),
            total = envelope.total,
            "listing batch received"
        );
        Ok(envelope)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, EndpointError> {
    let url = Url::parse(endpoint).map_err(|source| EndpointError::Invalid {
        endpoint: endpoint.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(EndpointError::UnsupportedScheme(endpoint.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{BearerToken, FnHeaders, NoHeaders};
    use crate::http::HttpResponse;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Mock HTTP client for testing
    struct MockHttpClient {
        responses: Mutex<Vec<Result<HttpResponse>>>,
        requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl MockHttpClient {
        fn new(responses: Vec<Result<HttpResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn request(
            &self,
            _method: &str,
            url: &str,
            headers: Vec<(String, String)>,
            _body: Option<Vec<u8>>,
        ) -> Result<HttpResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), headers));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(anyhow!("No more mock responses"));
            }
            responses.remove(0)
        }
    }

    fn ok(body: &str) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            headers: vec![],
            body: body.as_bytes().to_vec(),
        })
    }

    fn status(code: u16) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status: code,
            headers: vec![],
            body: vec![],
        })
    }

    fn gate(mock: MockHttpClient) -> FetchGate<MockHttpClient> {
        FetchGate::new(
            mock,
            "https://stories.example.com/api/stories",
            50,
            Arc::new(NoHeaders),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        let mock = MockHttpClient::new(vec![]);
        assert!(matches!(
            FetchGate::new(mock, "/api/stories", 50, Arc::new(NoHeaders)),
            Err(EndpointError::Invalid { .. })
        ));
        let mock = MockHttpClient::new(vec![]);
        assert!(matches!(
            FetchGate::new(mock, "ftp://example.com/x", 50, Arc::new(NoHeaders)),
            Err(EndpointError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_request_url_includes_paging_and_defined_filters() {
        let gate = FetchGate::new(
            MockHttpClient::new(vec![]),
            "https://stories.example.com/api/stories",
            500,
            Arc::new(NoHeaders),
        )
        .unwrap();
        let mut filters = RequestFilters::new()
            .with("category", "science fiction")
            .with("author", "");
        filters.unset("tag");

        assert_eq!(
            gate.request_url(100, &filters),
            "https://stories.example.com/api/stories?skip=100&limit=50&category=science+fiction"
        );
    }

    #[tokio::test]
    async fn test_fetch_object_envelope() {
        let gate = gate(MockHttpClient::new(vec![ok(r#"{"items":[1,2],"total":75}"#)]));
        let batch: FetchedBatch<u32> = gate.fetch(50, &RequestFilters::new()).await.unwrap();
        assert_eq!(batch.items, vec![1, 2]);
        assert_eq!(batch.total, 75);
        assert_eq!(
            gate.http.urls(),
            vec!["https://stories.example.com/api/stories?skip=50&limit=50"]
        );
    }

    #[tokio::test]
    async fn test_fetch_classifies_statuses() {
        let gate = gate(MockHttpClient::new(vec![status(401), status(500), status(403)]));
        let filters = RequestFilters::new();
        assert_eq!(
            gate.fetch::<u32>(0, &filters).await.unwrap_err(),
            FetchError::Unauthorized
        );
        assert_eq!(
            gate.fetch::<u32>(0, &filters).await.unwrap_err(),
            FetchError::Http { status: 500 }
        );
        assert_eq!(
            gate.fetch::<u32>(0, &filters).await.unwrap_err(),
            FetchError::Http { status: 403 }
        );
    }

    #[tokio::test]
    async fn test_network_and_parse_failures_are_transport() {
        let gate = gate(MockHttpClient::new(vec![
            Err(anyhow!("connection reset")),
            ok("<html>"),
            Ok(HttpResponse {
                status: 200,
                headers: vec![("Content-Type".to_string(), "text/html".to_string())],
                body: b"<html>".to_vec(),
            }),
        ]));
        let filters = RequestFilters::new();
        assert!(matches!(
            gate.fetch::<u32>(0, &filters).await,
            Err(FetchError::Transport(msg)) if msg.contains("connection reset")
        ));
        assert!(matches!(
            gate.fetch::<u32>(0, &filters).await,
            Err(FetchError::Transport(_))
        ));
        assert!(matches!(
            gate.fetch::<u32>(0, &filters).await,
            Err(FetchError::Transport(msg)) if msg.contains("content-type: text/html")
        ));
    }

    #[tokio::test]
    async fn test_header_failure_skips_request() {
        let gate = FetchGate::new(
            MockHttpClient::new(vec![ok("[]")]),
            "https://stories.example.com/api/stories",
            10,
            Arc::new(FnHeaders(|| -> Result<Vec<(String, String)>> {
                anyhow::bail!("token refresh failed")
            })),
        )
        .unwrap();

        let err = gate.fetch::<u32>(0, &RequestFilters::new()).await.unwrap_err();
        assert!(matches!(err, FetchError::AuthResolution(msg) if msg.contains("token refresh")));
        assert!(gate.http.urls().is_empty());
    }

    #[tokio::test]
    async fn test_resolved_headers_are_sent() {
        let gate = FetchGate::new(
            MockHttpClient::new(vec![ok("[]")]),
            "https://stories.example.com/api/stories",
            10,
            Arc::new(BearerToken::new("t0k")),
        )
        .unwrap();

        gate.fetch::<u32>(0, &RequestFilters::new()).await.unwrap();
        let requests = gate.http.requests.lock().unwrap();
        let headers = &requests[0].1;
        assert!(headers.contains(&("Authorization".to_string(), "Bearer t0k".to_string())));
        assert!(headers.contains(&("Accept".to_string(), "application/json".to_string())));
    }
}
