use async_trait::async_trait;

use crate::error::RequestError;

/// The system under load, seen through the two request shapes users issue.
///
/// The engine never constructs clients itself; callers hand in an
/// implementation (an HTTP client in the binary, a recording fake in tests)
/// and users share it behind an `Arc`.
#[async_trait]
pub trait Target: Send + Sync + 'static {
    /// POST a JSON document to `path`. `body` is already serialized.
    async fn post_json(&self, path: &str, body: String) -> Result<(), RequestError>;

    /// GET `path`. Response bodies are read and dropped.
    async fn get(&self, path: &str) -> Result<(), RequestError>;
}
