// storypager - buffered, prefetching pagination over listing endpoints
//
// A listing is fetched from the server in large batches and sliced into
// smaller pages locally. The batch after the last buffered one is read ahead
// in the background when the user nears the end of what is buffered.

pub mod init;
pub mod session;
pub mod story;

pub use init::{init_tracing, open_stories};
pub use session::{ListingError, ListingItem, ListingOptions, ListingSnapshot, PagedListing};
pub use story::{AuthorRef, Story, StoryQuery};

pub use storypager_config::PagerConfig;
pub use storypager_core::{FilterValue, LoadPhase, PrefetchPhase, RequestFilters};
pub use storypager_http::{
    BearerToken, FetchError, FnHeaders, HeadersProvider, HttpClient, HttpResponse, NoHeaders,
    ReqwestHttpClient, StaticHeaders,
};
