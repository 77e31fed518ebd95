//! Coalescing of bursty change notifications.
//!
//! Editors and `cp` commonly produce several filesystem events for a single
//! logical save. The debouncer turns a burst into one signal: it waits for
//! the first event, then keeps extending a quiet-period deadline for every
//! further event, and yields once the window elapses with nothing new.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};

/// Debounces a stream of unit notifications.
#[derive(Debug)]
pub struct Debouncer {
    rx: mpsc::UnboundedReceiver<()>,
    window: Duration,
}

impl Debouncer {
    pub fn new(rx: mpsc::UnboundedReceiver<()>, window: Duration) -> Self {
        Self { rx, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for the next settled burst and return how many raw events it
    /// contained.
    ///
    /// Returns `None` once every sender is gone and nothing is pending.
    /// A burst that is cut short by the channel closing is still reported.
    pub async fn next(&mut self) -> Option<usize> {
        self.rx.recv().await?;
        let mut count = 1;

        let deadline = time::sleep(self.window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return Some(count),
                event = self.rx.recv() => match event {
                    Some(()) => {
                        count += 1;
                        deadline.as_mut().reset(Instant::now() + self.window);
                    }
                    None => return Some(count),
                },
            }
        }
    }
}
