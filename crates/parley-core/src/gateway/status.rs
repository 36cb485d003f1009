//! Per-connection status machine and escalation timer.
//!
//! Transitions: `idle -> typing -> {processing | idle}`, `processing ->
//! idle`. `typing` is entered synchronously with message receipt;
//! `processing` only via the escalation timer, and only if the exchange is
//! still pending. `idle` is reachable from any state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Processing state of a connection's current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Typing,
    Processing,
}

/// Shared status value for one connection.
///
/// Cloning shares state: the exchange task, its escalation timer, and the
/// connection loop all observe the same machine. Held across `.await`
/// points only as a clone, never as a guard.
#[derive(Clone)]
pub struct StatusMachine {
    state: Arc<Mutex<Status>>,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(Status::Idle)),
        }
    }

    pub fn current(&self) -> Status {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enter `typing`. Valid from any state: a new message always starts
    /// a new exchange.
    pub fn set_typing(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Status::Typing;
    }

    /// Escalate `typing -> processing`. Returns `false` (and changes
    /// nothing) from any other state, which makes a late timer a no-op.
    pub fn escalate(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == Status::Typing {
            *state = Status::Processing;
            true
        } else {
            false
        }
    }

    /// Return to `idle` from any state.
    pub fn reset(&self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Status::Idle;
    }
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StatusMachine").field(&self.current()).finish()
    }
}

/// Single deferred callback that fires once after `delay` unless cancelled.
///
/// Cancellation is idempotent, and firing after cancellation is a no-op:
/// whichever of {fire, cancel} flips the flag first wins.
pub struct EscalationTimer {
    settled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl EscalationTimer {
    /// Arm the timer. `on_fire` runs on a spawned task after `delay`.
    pub fn spawn<F>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let settled = Arc::new(AtomicBool::new(false));
        let flag = settled.clone();
        // Anchor the deadline at arm time; the spawned task may not be
        // polled until later.
        let deadline = tokio::time::Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if !flag.swap(true, Ordering::SeqCst) {
                on_fire();
            }
        });
        Self { settled, handle }
    }

    /// Cancel the timer if it has not fired yet. Safe to call repeatedly.
    pub fn cancel(&self) {
        if !self.settled.swap(true, Ordering::SeqCst) {
            self.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn typing_then_escalate_then_reset() {
        let machine = StatusMachine::new();
        assert_eq!(machine.current(), Status::Idle);
        machine.set_typing();
        assert_eq!(machine.current(), Status::Typing);
        assert!(machine.escalate());
        assert_eq!(machine.current(), Status::Processing);
        machine.reset();
        assert_eq!(machine.current(), Status::Idle);
    }

    #[test]
    fn escalate_only_from_typing() {
        let machine = StatusMachine::new();
        assert!(!machine.escalate());
        assert_eq!(machine.current(), Status::Idle);
        machine.set_typing();
        assert!(machine.escalate());
        // Second escalation is a no-op.
        assert!(!machine.escalate());
        assert_eq!(machine.current(), Status::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_once_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _timer = EscalationTimer::spawn(Duration::from_secs(3), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_anchored_at_arm_time() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _timer = EscalationTimer::spawn(Duration::from_secs(3), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // The timer task has not been polled yet; the full window elapses
        // before it ever runs. It must still fire at arm + 3s, not at
        // first-poll + 3s.
        tokio::time::advance(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let timer = EscalationTimer::spawn(Duration::from_secs(3), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        timer.cancel();
        timer.cancel(); // idempotent

        tokio::time::advance(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_is_noop() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let timer = EscalationTimer::spawn(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        timer.cancel();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
