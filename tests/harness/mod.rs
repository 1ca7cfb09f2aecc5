//! Scripted listing server for session tests
//!
//! Serves a row set over `skip`/`limit`/`category` the way the story API does,
//! records every request, and can fail or hold individual offsets so tests can
//! observe in-flight state.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use storypager::{HttpClient, HttpResponse, LoadPhase, ListingSnapshot, PagedListing};
use tokio::sync::Notify;

pub const ENDPOINT: &str = "http://stories.test/api/stories";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: u64,
    pub category: String,
}

/// `count` rows alternating between fiction (even ids) and mystery (odd ids).
pub fn rows(count: u64) -> Vec<Row> {
    (0..count)
        .map(|id| Row {
            id,
            category: if id % 2 == 0 { "fiction" } else { "mystery" }.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `{"items": [...], "total": n}`
    Envelope,
    BareArray,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: HashMap<String, String>,
}

impl RecordedRequest {
    pub fn skip(&self) -> u64 {
        self.params
            .get("skip")
            .and_then(|skip| skip.parse().ok())
            .unwrap_or(0)
    }
}

pub struct ListingServer {
    rows: Mutex<Vec<Row>>,
    shape: Mutex<Shape>,
    status: Mutex<Option<u16>>,
    failures: Mutex<HashMap<u64, VecDeque<u16>>>,
    holds: Mutex<HashMap<u64, Arc<Notify>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ListingServer {
    pub fn new(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            shape: Mutex::new(Shape::Envelope),
            status: Mutex::new(None),
            failures: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock() = rows;
    }

    pub fn set_shape(&self, shape: Shape) {
        *self.shape.lock() = shape;
    }

    /// Answer every request with `status` until cleared.
    pub fn set_status(&self, status: Option<u16>) {
        *self.status.lock() = status;
    }

    /// Fail the next request for `offset` once.
    pub fn fail_next(&self, offset: u64, status: u16) {
        self.failures
            .lock()
            .entry(offset)
            .or_default()
            .push_back(status);
    }

    /// Park the next request for `offset` until the returned handle is notified.
    pub fn hold(&self, offset: u64) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.holds.lock().insert(offset, Arc::clone(&notify));
        notify
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn skips(&self) -> Vec<u64> {
        self.requests.lock().iter().map(RecordedRequest::skip).collect()
    }

    pub fn count_for(&self, offset: u64) -> usize {
        self.skips().into_iter().filter(|skip| *skip == offset).count()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    fn respond(&self, params: &HashMap<String, String>, skip: u64) -> HttpResponse {
        if let Some(status) = *self.status.lock() {
            return json_response(status, serde_json::json!({"error": "denied"}));
        }
        let failure = self
            .failures
            .lock()
            .get_mut(&skip)
            .and_then(VecDeque::pop_front);
        if let Some(status) = failure {
            return json_response(status, serde_json::json!({"error": "scripted failure"}));
        }

        let limit = params
            .get("limit")
            .and_then(|limit| limit.parse::<usize>().ok())
            .unwrap_or(50);
        let matching: Vec<Row> = self
            .rows
            .lock()
            .iter()
            .filter(|row| params.get("category").map_or(true, |c| row.category == *c))
            .cloned()
            .collect();
        let items: Vec<Row> = matching
            .iter()
            .skip(skip as usize)
            .take(limit)
            .cloned()
            .collect();

        let body = match *self.shape.lock() {
            Shape::Envelope => serde_json::json!({"items": items, "total": matching.len()}),
            Shape::BareArray => serde_json::json!(items),
        };
        json_response(200, body)
    }
}

#[async_trait]
impl HttpClient for ListingServer {
    async fn request(
        &self,
        _method: &str,
        url: &str,
        headers: Vec<(String, String)>,
        _body: Option<Vec<u8>>,
    ) -> anyhow::Result<HttpResponse> {
        let params = query_params(url);
        let skip = params
            .get("skip")
            .and_then(|skip| skip.parse().ok())
            .unwrap_or(0);
        self.requests.lock().push(RecordedRequest {
            url: url.to_string(),
            headers,
            params: params.clone(),
        });

        let hold = self.holds.lock().remove(&skip);
        if let Some(notify) = hold {
            notify.notified().await;
        }
        tokio::task::yield_now().await;

        Ok(self.respond(&params, skip))
    }
}

fn query_params(url: &str) -> HashMap<String, String> {
    url.split_once('?')
        .map(|(_, query)| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: body.to_string().into_bytes(),
    }
}

/// Yield until `pred` holds for the listing's snapshot.
pub async fn wait_until<F>(listing: &PagedListing<Row, Arc<ListingServer>>, pred: F)
where
    F: Fn(&ListingSnapshot<Row>) -> bool,
{
    for _ in 0..200 {
        if pred(&listing.snapshot()) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("listing never reached the expected state: {:?}", listing.snapshot());
}

pub fn ids(snapshot: &ListingSnapshot<Row>) -> Vec<u64> {
    snapshot.items_for_page.iter().map(|row| row.id).collect()
}

pub fn assert_ready(snapshot: &ListingSnapshot<Row>) {
    assert_eq!(snapshot.load_phase, LoadPhase::Ready);
    assert!(!snapshot.is_loading);
}
