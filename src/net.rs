//! Outbound HTTP.

mod fetch;
mod response;

pub use fetch::post_json;
pub use response::Response;
