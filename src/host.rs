//! Newline-delimited JSON transport between a host process and the bridge.
//!
//! Each line on the reader is one `{type, arg?, args?, data?}` command; each
//! outbound [`HostMessage`] is written as one line.

use gatebridge_data::{HostMessage, RawCommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Parses one line. Blank lines yield `None` without a warning.
pub fn parse_line(line: &str) -> Option<RawCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(raw) => Some(raw),
        Err(e) => {
            tracing::warn!(error = %e, "dropping unparseable host line");
            None
        }
    }
}

/// Forwards parsed lines until EOF or until the bridge goes away.
pub async fn read_commands<R>(reader: R, tx: UnboundedSender<RawCommand>) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(raw) = parse_line(&line) {
            if tx.send(raw).is_err() {
                break;
            }
        }
    }
    tracing::debug!("host input closed");
    Ok(())
}

/// Writes every outbound message as a JSON line until the bridge drops the
/// sending side.
pub async fn write_messages<W>(mut writer: W, mut rx: UnboundedReceiver<HostMessage>) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
