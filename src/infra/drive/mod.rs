// Google Drive infra layer.
// - `drive_api_client.rs` talks to the Drive v3 REST API.
// - `export_transport.rs` fetches exported renditions.
// - `service_account.rs` produces bearer tokens.
// - `in_memory.rs` backs the core's tests, `http_stub.rs` the adapters' tests.

pub mod drive_api_client;
pub mod export_transport;
pub mod service_account;

#[cfg(test)]
pub mod http_stub;
#[cfg(test)]
pub mod in_memory;

pub use drive_api_client::DriveApiClient;
pub use export_transport::HttpExportTransport;
pub use service_account::{ServiceAccountAuth, StaticToken};
