//! Jira access: raw REST calls, response mapping and the cached client the
//! rest of the crate talks to.

mod api_types;
mod cache;
mod cached_client;
mod client;
mod error;
#[cfg(test)]
pub mod testing;
pub mod transport;
mod types;

pub use cache::CacheTtls;
pub use cached_client::CachedJiraClient;
pub use transport::HttpTransport;
pub use types::{Credentials, Task, WorkLog};
