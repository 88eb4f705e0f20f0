//! Built-in command sinks.

use async_trait::async_trait;

use super::traits::DeviceCommandSink;
use super::types::DeviceCommand;
use crate::error::CommandResult;

/// Sink that only logs commands.
///
/// Used by the standalone server in dry-run deployments and whenever the real
/// device bridge is not wired in yet.
pub struct LoggingCommandSink;

#[async_trait]
impl DeviceCommandSink for LoggingCommandSink {
    async fn execute(&self, command: &DeviceCommand) -> CommandResult<()> {
        log::info!("[Sink] {}", command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_sink_accepts_everything() {
        let sink = LoggingCommandSink;
        let result = sink
            .execute(&DeviceCommand::Stop {
                targets: vec!["media_player.kitchen".into()],
            })
            .await;
        assert!(result.is_ok());
    }
}
