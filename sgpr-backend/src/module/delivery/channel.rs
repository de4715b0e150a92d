use async_trait::async_trait;
use sgpr_common::DestinationId;

/// Outbound message channel. `text` uses the Telegram HTML subset
/// (`<b>`, `<i>`, `<code>`).
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, destination: &DestinationId, text: &str) -> anyhow::Result<()>;
}
