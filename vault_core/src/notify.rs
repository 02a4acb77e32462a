use async_trait::async_trait;

/// Receives a change event after any mutating file operation.
///
/// Delivery is fire-and-forget from the engine's point of view: errors are
/// logged by the caller and never fail the operation that triggered them.
#[async_trait]
pub trait NotificationSink: std::fmt::Debug + Send + Sync + 'static {
    async fn notify(&self, database_id: &str, asset_id: &str) -> anyhow::Result<()>;
}

/// Emits the change event as a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, database_id: &str, asset_id: &str) -> anyhow::Result<()> {
        tracing::info!(database_id, asset_id, "asset files changed");
        Ok(())
    }
}
