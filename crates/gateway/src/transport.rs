//! Outbound side of the line-delimited transport.
//!
//! Every message leaving the server goes through one `Outbound` queue drained
//! by a single writer task, so lines are never interleaved.

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use sandbox_mcp_core::{Error, NotificationSink, ProgressNotification, Result};

use crate::jsonrpc::Notification;

/// Handle for queueing outbound messages.
#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<String>,
}

impl Outbound {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Serialize `message` onto the queue.
    pub fn send<T: Serialize>(&self, message: &T) -> Result<()> {
        let line = serde_json::to_string(message)?;
        self.tx
            .send(line)
            .map_err(|_| Error::transport("output closed"))
    }
}

/// Write queued lines to `writer` until every `Outbound` handle is dropped.
pub async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::transport(format!("failed to write message: {}", e)))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| Error::transport(format!("failed to write message: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::transport(format!("failed to flush output: {}", e)))?;
    }
    Ok(())
}

/// Forwards progress of one request to the client as `notifications/progress`.
pub struct ClientNotifier {
    out: Outbound,
}

impl ClientNotifier {
    pub fn new(out: Outbound) -> Self {
        Self { out }
    }
}

#[async_trait]
impl NotificationSink for ClientNotifier {
    async fn notify_progress(&self, notification: ProgressNotification) -> Result<()> {
        let params = serde_json::to_value(&notification)?;
        self.out
            .send(&Notification::new("notifications/progress", params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandbox_mcp_core::ProgressToken;
    use serde_json::{json, Value};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_progress_notification_line() {
        let (out, mut rx) = Outbound::channel();
        let notifier = ClientNotifier::new(out);

        notifier
            .notify_progress(ProgressNotification {
                progress: 15,
                total: 100,
                progress_token: ProgressToken::String("t".into()),
            })
            .await
            .unwrap();

        let line = rx.recv().await.unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value,
            json!({
                "jsonrpc": "2.0",
                "method": "notifications/progress",
                "params": {"progress": 15, "total": 100, "progressToken": "t"}
            })
        );
    }

    #[tokio::test]
    async fn test_closed_output_is_transport_error() {
        let (out, rx) = Outbound::channel();
        drop(rx);
        let err = out.send(&json!({})).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_write_loop_writes_one_line_per_message() {
        let (out, rx) = Outbound::channel();
        let (client, server) = tokio::io::duplex(1024);

        out.send(&json!({"a": 1})).unwrap();
        out.send(&json!({"b": 2})).unwrap();
        drop(out);
        write_loop(server, rx).await.unwrap();

        let mut written = String::new();
        let mut client = client;
        client.read_to_string(&mut written).await.unwrap();
        assert_eq!(written, "{\"a\":1}\n{\"b\":2}\n");
    }
}
