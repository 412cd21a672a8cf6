use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use fogrelay_engine::{LatencyRelay, Outcome, RawMessage};

// ═══════════════════════════════════════════════════════════════
//  Frame reader: one message per line
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A full frame is in the buffer (`\n` and a trailing `\r` removed).
    Complete,
    /// Frame exceeded the configured limit; the connection must be closed.
    TooLong,
    Eof,
}

/// Read the next newline-terminated frame into `out` (cleared first).
///
/// A final line without a newline is still delivered before `Eof`.
pub(crate) async fn read_frame<R>(reader: &mut R, out: &mut Vec<u8>, max_len: usize) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    out.clear();
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(match out.len() {
                0 => Frame::Eof,
                n if max_len > 0 && n > max_len => Frame::TooLong,
                _ => Frame::Complete,
            });
        }

        let newline = buf.iter().position(|&b| b == b'\n');
        let take = newline.unwrap_or(buf.len());
        out.extend_from_slice(&buf[..take]);
        reader.consume(take + newline.map_or(0, |_| 1));

        if newline.is_some() {
            if out.last() == Some(&b'\r') {
                out.pop();
            }
            if max_len > 0 && out.len() > max_len {
                return Ok(Frame::TooLong);
            }
            return Ok(Frame::Complete);
        }
        // One extra byte may still be a `\r` waiting for its `\n`.
        if max_len > 0 && out.len() > max_len + 1 {
            return Ok(Frame::TooLong);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Acceptor
// ═══════════════════════════════════════════════════════════════

/// Accept connections until `token` is cancelled, then wait for the
/// connection tasks to finish.
///
/// Messages of one connection are relayed one after another; connections
/// run in parallel.
pub async fn run(listener: TcpListener, relay: Arc<LatencyRelay>, max_frame_bytes: usize, token: CancellationToken) {
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::info!(%peer, "new connection");
                    let relay = relay.clone();
                    let token = token.clone();
                    tracker.spawn(async move {
                        handle_connection(stream, peer, relay, max_frame_bytes, token).await;
                        tracing::info!(%peer, "connection closed");
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept error");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                }
            },
            _ = token.cancelled() => break,
        }
    }

    tracker.close();
    tracker.wait().await;
    tracing::info!("ingest finished");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    relay: Arc<LatencyRelay>,
    max_frame_bytes: usize,
    token: CancellationToken,
) {
    let mut reader = BufReader::new(stream);
    let mut frame = Vec::with_capacity(8192);

    loop {
        let read = tokio::select! {
            r = read_frame(&mut reader, &mut frame, max_frame_bytes) => r,
            _ = token.cancelled() => return,
        };

        match read {
            Ok(Frame::Complete) => {
                if frame.is_empty() {
                    continue;
                }
                relay_one(&relay, frame.clone(), &token).await;
            }
            Ok(Frame::TooLong) => {
                tracing::error!(%peer, max_frame_bytes, "frame too long, disconnecting");
                return;
            }
            Ok(Frame::Eof) => return,
            Err(e) => {
                tracing::error!(%peer, error = %e, "read error");
                return;
            }
        }
    }
}

/// Run one invocation on its own task so a panic stays contained to the
/// message that caused it.
async fn relay_one(relay: &Arc<LatencyRelay>, payload: Vec<u8>, token: &CancellationToken) {
    let relay = relay.clone();
    let token = token.clone();
    let task = tokio::spawn(async move { relay.dispatch(RawMessage::Bytes(&payload), &token).await });

    match task.await {
        Ok(Outcome::Relayed { prediction, .. }) => {
            tracing::debug!(prediction = prediction.value, "message relayed");
        }
        Ok(Outcome::Dropped(kind) | Outcome::DeadLettered(kind)) => {
            tracing::debug!(%kind, "message not relayed");
        }
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "relay invocation panicked, message dropped");
        }
        Err(e) => {
            tracing::warn!(error = %e, "relay invocation aborted");
        }
    }
}
