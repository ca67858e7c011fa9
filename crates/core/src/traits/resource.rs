use async_trait::async_trait;

use crate::error::Result;

/// A family of readable resources sharing one URI template.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// RFC 6570 URI template, e.g. `containers://{id}/logs`.
    fn uri_template(&self) -> &str;

    /// Display name of the resource family.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn mime_type(&self) -> &str {
        "text/plain"
    }

    /// Read the resource at `uri`; `Ok(None)` when the URI does not match the template.
    async fn read(&self, uri: &str) -> Result<Option<String>>;
}
