//! Debounced button watching.
//!
//! Each physical input gets its own watcher task that turns raw falling
//! edges into discrete [`ButtonEvent`]s on a bounded channel. The controller
//! drains the channel once per loop iteration, so the interrupt-style edge
//! delivery never races the session state machine.

use crate::hal::DigitalInput;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::time::interval;

/// Minimum spacing between two accepted edges from one input.
pub const DEBOUNCE_WINDOW_MS: u64 = 200;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonSource {
    SessionToggle,
    RecordToggle,
}

#[derive(Debug, Clone, Copy)]
pub struct ButtonEvent {
    pub source: ButtonSource,
    pub edge_ms: u64,
}

/// Edge filter: an edge is accepted only when at least the window has passed
/// since this input's last *accepted* edge.
#[derive(Debug)]
pub struct Debouncer {
    window_ms: u64,
    last_accepted_ms: Option<u64>,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            last_accepted_ms: None,
        }
    }

    pub fn accept(&mut self, edge_ms: u64) -> bool {
        if let Some(last) = self.last_accepted_ms {
            if edge_ms.saturating_sub(last) < self.window_ms {
                return false;
            }
        }
        self.last_accepted_ms = Some(edge_ms);
        true
    }
}

/// Watcher task for one active-low input. Polls for falling edges, debounces
/// them, and delivers accepted edges as events. Exits when the consumer side
/// of the channel is gone.
pub async fn button_watch_loop(
    mut input: Box<dyn DigitalInput>,
    source: ButtonSource,
    epoch: Instant,
    tx: Sender<ButtonEvent>,
) {
    let mut debouncer = Debouncer::new(DEBOUNCE_WINDOW_MS);
    let mut poll = interval(POLL_INTERVAL);
    let mut was_low = input.is_low();

    loop {
        poll.tick().await;
        let low = input.is_low();
        if low && !was_low {
            let edge_ms = epoch.elapsed().as_millis() as u64;
            if debouncer.accept(edge_ms) {
                match tx.try_send(ButtonEvent { source, edge_ms }) {
                    Ok(_) => log::debug!("{source:?} edge accepted at {edge_ms}ms"),
                    Err(TrySendError::Closed(_)) => break,
                    Err(TrySendError::Full(_)) => {
                        // Consumer is behind; the press is dropped rather
                        // than queued into a stale transition.
                    }
                }
            }
        }
        was_low = low;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn test_edges_inside_window_are_discarded() {
        let mut debouncer = Debouncer::new(DEBOUNCE_WINDOW_MS);
        assert!(debouncer.accept(1000));
        assert!(!debouncer.accept(1050));
        // Still measured against the last accepted edge, not the bounce
        assert!(!debouncer.accept(1199));
        assert!(debouncer.accept(1200));
    }

    #[test]
    fn test_edges_outside_window_are_accepted() {
        let mut debouncer = Debouncer::new(DEBOUNCE_WINDOW_MS);
        assert!(debouncer.accept(0));
        assert!(debouncer.accept(300));
        assert!(debouncer.accept(600));
    }

    #[test]
    fn test_bounce_train_yields_single_event() {
        let mut debouncer = Debouncer::new(DEBOUNCE_WINDOW_MS);
        let accepted = (0..10).filter(|i| debouncer.accept(i * 15)).count();
        assert_eq!(accepted, 1);
    }

    struct SharedLevel(Arc<AtomicBool>);

    impl crate::hal::DigitalInput for SharedLevel {
        fn is_low(&mut self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_watcher_delivers_falling_edge() {
        let level = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(button_watch_loop(
            Box::new(SharedLevel(level.clone())),
            ButtonSource::SessionToggle,
            Instant::now(),
            tx,
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        level.store(true, Ordering::SeqCst);

        let event = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("watcher should deliver within the timeout")
            .expect("channel open");
        assert_eq!(event.source, ButtonSource::SessionToggle);

        drop(rx);
        let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
    }
}
