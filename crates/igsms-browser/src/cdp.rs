//! Chrome DevTools Protocol connection.
//!
//! One WebSocket per page target. Commands are JSON frames tagged with an
//! increasing id; the reader task routes each response back to the caller
//! waiting on that id. Events are not subscribed to and are dropped.

use futures_util::{SinkExt, StreamExt};
use igsms_core::error::IgsmsError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

/// Default per-command timeout.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

type Reply = Result<Value, IgsmsError>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// A parsed inbound frame.
#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
    /// Reply to a command we sent.
    Response { id: u64, result: Result<Value, String> },
    /// Unsolicited notification.
    Event { method: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    id: Option<u64>,
    method: Option<String>,
    result: Option<Value>,
    error: Option<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    code: i64,
    message: String,
}

/// Parse a text frame. Returns `None` for frames that are neither a response
/// nor an event.
pub(crate) fn parse_frame(text: &str) -> Option<Frame> {
    let raw: RawFrame = serde_json::from_str(text).ok()?;
    match (raw.id, raw.method) {
        (Some(id), _) => {
            let result = match raw.error {
                Some(err) => Err(format!("{} ({})", err.message, err.code)),
                None => Ok(raw.result.unwrap_or(Value::Null)),
            };
            Some(Frame::Response { id, result })
        }
        (None, Some(method)) => Some(Frame::Event { method }),
        (None, None) => None,
    }
}

/// A live DevTools WebSocket session.
pub struct CdpConnection {
    next_id: AtomicU64,
    outgoing: mpsc::Sender<Message>,
    pending: Pending,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CdpConnection {
    /// Connect to a target's `webSocketDebuggerUrl`.
    pub async fn connect(ws_url: &str) -> Result<Self, IgsmsError> {
        let (ws, _) = connect_async(ws_url)
            .await
            .map_err(|e| IgsmsError::Browser(format!("devtools connect failed: {e}")))?;
        let (mut sink, mut stream) = ws.split();

        let (outgoing, mut outgoing_rx) = mpsc::channel::<Message>(64);
        let writer = tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    warn!("devtools write failed: {e}");
                    break;
                }
            }
        });

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match parse_frame(&text) {
                        Some(Frame::Response { id, result }) => {
                            let waiter = reader_pending.lock().await.remove(&id);
                            if let Some(tx) = waiter {
                                let _ = tx.send(result.map_err(|e| {
                                    IgsmsError::Browser(format!("devtools error: {e}"))
                                }));
                            }
                        }
                        Some(Frame::Event { method }) => trace!("devtools event {method}"),
                        None => debug!("ignoring unrecognized devtools frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("devtools read failed: {e}");
                        break;
                    }
                }
            }

            // Fail every in-flight call so nobody waits for the timeout.
            for (_, tx) in reader_pending.lock().await.drain() {
                let _ = tx.send(Err(IgsmsError::Browser(
                    "devtools connection closed".to_string(),
                )));
            }
            debug!("devtools reader stopped");
        });

        Ok(Self {
            next_id: AtomicU64::new(1),
            outgoing,
            pending,
            reader,
            writer,
        })
    }

    /// Send a command and wait for its result.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, IgsmsError> {
        self.call_with_timeout(method, params, CALL_TIMEOUT).await
    }

    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, IgsmsError> {
        if self.is_closed() {
            return Err(IgsmsError::Browser(
                "devtools connection closed".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let frame = json!({ "id": id, "method": method, "params": params });
        if self
            .outgoing
            .send(Message::Text(frame.to_string()))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(IgsmsError::Browser(
                "devtools connection closed".to_string(),
            ));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(IgsmsError::Browser(
                "devtools connection closed".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(IgsmsError::Browser(format!(
                    "{method} timed out after {}s",
                    timeout.as_secs()
                )))
            }
        }
    }

    /// Whether the socket has gone away.
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished() || self.writer.is_finished()
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
