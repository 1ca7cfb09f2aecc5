//! Listing endpoint access
//!
//! HTTP transport with pluggable clients, header providers for
//! authentication, and the fetch gate that turns one `skip`/`limit` request
//! into a typed batch or a classified [`FetchError`].

pub use envelope::{decode_envelope, Envelope};
pub use error::{EndpointError, FetchError};
pub use gate::{FetchGate, FetchedBatch};
pub use headers::{BearerToken, FnHeaders, HeadersProvider, NoHeaders, StaticHeaders};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient, DEFAULT_USER_AGENT};

pub mod envelope;
pub mod error;
pub mod gate;
pub mod headers;
pub mod http;
