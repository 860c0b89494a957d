// ── Retry queue ──
//
// Commands that failed because the link dropped wait here until the next
// pairing has delivered its zone snapshot, then replay once.

use tokio::sync::Mutex;
use tracing::{debug, info};

type Replay = Box<dyn FnOnce() + Send>;

struct PendingRetry {
    method: &'static str,
    replay: Replay,
}

#[derive(Default)]
pub struct RetryQueue {
    pending: Mutex<Vec<PendingRetry>>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, method: &'static str, replay: impl FnOnce() + Send + 'static) {
        let mut pending = self.pending.lock().await;
        pending.push(PendingRetry {
            method,
            replay: Box::new(replay),
        });
        debug!(method, queued = pending.len(), "command queued for replay");
    }

    /// Take every queued replay and run it in enqueue order. Returns how
    /// many ran.
    pub async fn drain_and_clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.pending.lock().await);
        let count = drained.len();
        if count > 0 {
            info!(count, "replaying queued commands");
        }
        for retry in drained {
            debug!(method = retry.method, "replaying command");
            (retry.replay)();
        }
        count
    }

    /// Replays waiting for the next drain.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl std::fmt::Debug for RetryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryQueue").finish_non_exhaustive()
    }
}
