pub mod api;
pub mod endpoints;
pub mod http;

pub use api::{ApiClient, fetch_all, race};
pub use http::HttpTransport;
