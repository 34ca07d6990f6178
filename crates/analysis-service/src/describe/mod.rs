//! Optional generative descriptions for detected visual elements.

use async_trait::async_trait;

mod generative;
mod mock_describer;

pub use generative::GenerativeDescriber;
pub use mock_describer::MockDescriber;

#[async_trait]
pub trait Descriptor: Send + Sync {
    /// Produce a structured description of a cropped element image.
    async fn describe(&self, jpeg: &[u8]) -> anyhow::Result<serde_json::Value>;
}
