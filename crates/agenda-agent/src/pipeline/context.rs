use async_trait::async_trait;

/// Outbound side of the pipeline.
///
/// Defined here so channel crates can depend on `agenda-agent` without the
/// agent crate knowing about any of them.
#[async_trait]
pub trait ChannelPoster: Send + Sync {
    /// Channel label for logs (e.g. `"discord"`).
    fn name(&self) -> &str;

    /// Post `content` to `channel_id`, splitting as the platform requires.
    ///
    /// Returns one acknowledgment id per posted message, in order. Stops at
    /// the first rejected message; earlier messages stay posted.
    async fn post(
        &self,
        channel_id: &str,
        content: &str,
        token: &str,
    ) -> agenda_core::Result<Vec<String>>;
}
