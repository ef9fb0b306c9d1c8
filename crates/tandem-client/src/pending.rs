use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tandem_jsonrpc::{JsonRpcMessage, RpcError};
use tokio::sync::oneshot;

/// One in-flight call awaiting its response.
#[derive(Debug)]
struct PendingCall {
    method: String,
    created_at: Instant,
    resolve: oneshot::Sender<Result<JsonRpcMessage, RpcError>>,
}

/// Map of in-flight call ids to their wakers.
///
/// Entries are inserted at send time and removed on the matching response,
/// on cancellation (timeout), or when the connection dies and everything is
/// failed at once. Interleaved responses are fine: matching is by id only.
#[derive(Debug, Default)]
pub struct PendingCalls {
    entries: Mutex<HashMap<i64, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and hand back the receiver its caller awaits.
    pub fn register(
        &self,
        id: i64,
        method: &str,
    ) -> oneshot::Receiver<Result<JsonRpcMessage, RpcError>> {
        let (resolve, receiver) = oneshot::channel();
        self.entries.lock().insert(
            id,
            PendingCall {
                method: method.to_string(),
                created_at: Instant::now(),
                resolve,
            },
        );
        receiver
    }

    /// Resolve the call with this id. Returns `false` when no entry matches
    /// (already completed, timed out, or never ours).
    pub fn complete(&self, id: i64, message: JsonRpcMessage) -> bool {
        match self.entries.lock().remove(&id) {
            Some(entry) => {
                tracing::debug!(
                    id,
                    method = %entry.method,
                    elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
                    "matched response to pending call"
                );
                entry.resolve.send(Ok(message)).is_ok()
            }
            None => false,
        }
    }

    /// Drop the entry without resolving it. The caller-side receiver then
    /// observes a closed channel.
    pub fn cancel(&self, id: i64) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    /// Reject every in-flight call with the same error. Used when the
    /// underlying connection closes. Returns how many were failed.
    pub fn fail_all(&self, error: RpcError) -> usize {
        let drained: Vec<PendingCall> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            let _ = entry.resolve.send(Err(error.clone()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tandem_jsonrpc::RequestId;

    #[tokio::test]
    async fn register_and_complete() {
        let pending = PendingCalls::new();
        let receiver = pending.register(1, "ping");
        assert_eq!(pending.len(), 1);

        assert!(pending.complete(1, JsonRpcMessage::success(RequestId::Number(1), json!("ok"))));
        let message = receiver.await.unwrap().unwrap();
        assert_eq!(message.id(), Some(&RequestId::Number(1)));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn complete_unknown_id_is_noop() {
        let pending = PendingCalls::new();
        assert!(!pending.complete(99, JsonRpcMessage::success(RequestId::Number(99), json!(0))));
    }

    #[tokio::test]
    async fn interleaved_completion_matches_by_id() {
        let pending = PendingCalls::new();
        let first = pending.register(1, "a");
        let second = pending.register(2, "b");
        let third = pending.register(3, "c");

        pending.complete(2, JsonRpcMessage::success(RequestId::Number(2), json!("two")));
        pending.complete(3, JsonRpcMessage::success(RequestId::Number(3), json!("three")));
        pending.complete(1, JsonRpcMessage::success(RequestId::Number(1), json!("one")));

        for (receiver, id) in [(first, 1), (second, 2), (third, 3)] {
            let message = receiver.await.unwrap().unwrap();
            assert_eq!(message.id(), Some(&RequestId::Number(id)));
        }
    }

    #[tokio::test]
    async fn cancel_closes_receiver() {
        let pending = PendingCalls::new();
        let receiver = pending.register(5, "slow");
        assert!(pending.cancel(5));
        assert!(receiver.await.is_err());
        // late response for the cancelled id is simply unmatched
        assert!(!pending.complete(5, JsonRpcMessage::success(RequestId::Number(5), json!(0))));
    }

    #[tokio::test]
    async fn fail_all_rejects_everything() {
        let pending = PendingCalls::new();
        let receivers: Vec<_> = (0..3).map(|id| pending.register(id, "m")).collect();

        assert_eq!(pending.fail_all(RpcError::connection_closed()), 3);
        assert!(pending.is_empty());
        for receiver in receivers {
            let error = receiver.await.unwrap().unwrap_err();
            assert_eq!(error.kind, tandem_jsonrpc::ErrorKind::ConnectionClosed);
        }
    }
}
