//! Waiting for input while keeping scheduled work alive.
//!
//! The engine's only suspension point is [`ByteMultiplexer::next_byte`].
//! While it waits, due scheduler events run at least once per idle period.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::scheduler::Scheduler;
use crate::transport::Transport;

/// How [`ByteMultiplexer`] interleaves waiting and scheduled work.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum IdleStrategy {
    /// Poll the link with the idle period as timeout, running due work
    /// after every timeout.
    #[default]
    Poll,
    /// Block on the read while a scoped ticker thread runs due work once per
    /// idle period.
    Ticker,
}

/// Pulls input bytes one at a time, driving the scheduler while idle.
#[derive(Debug, Clone)]
pub struct ByteMultiplexer {
    scheduler: Scheduler,
    idle_period: Duration,
    strategy: IdleStrategy,
}

impl ByteMultiplexer {
    pub fn new(scheduler: Scheduler, idle_period: Duration, strategy: IdleStrategy) -> Self {
        ByteMultiplexer {
            scheduler,
            idle_period,
            strategy,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn idle_period(&self) -> Duration {
        self.idle_period
    }

    pub fn strategy(&self) -> IdleStrategy {
        self.strategy
    }

    /// Wait for the next input byte.
    pub fn next_byte<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<u8, TransportError> {
        match self.strategy {
            IdleStrategy::Poll => self.next_byte_polling(transport),
            IdleStrategy::Ticker => self.next_byte_ticking(transport),
        }
    }

    fn next_byte_polling<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
    ) -> Result<u8, TransportError> {
        loop {
            if transport.poll_readable(self.idle_period)? {
                return transport.read_byte();
            }
            self.scheduler.run_due(Instant::now());
        }
    }

    fn next_byte_ticking<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
    ) -> Result<u8, TransportError> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let scheduler = &self.scheduler;
        let period = self.idle_period;

        thread::scope(|scope| {
            let ticker = scope.spawn(move || {
                let mut deadline = Instant::now() + period;
                while let Err(RecvTimeoutError::Timeout) = stop_rx.recv_deadline(deadline) {
                    scheduler.run_due(Instant::now());
                    deadline = Instant::now() + period;
                }
            });

            let byte = transport.read_byte();

            // The ticker may already be gone if it panicked.
            let _ = stop_tx.send(());
            if ticker.join().is_err() {
                tracing::error!("Scheduler ticker thread panicked");
            }
            byte
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::transport::MemoryTransport;
    use alink_diagnostics::Diagnostics;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn multiplexer(strategy: IdleStrategy) -> ByteMultiplexer {
        let scheduler = Scheduler::new(Diagnostics::new(500));
        ByteMultiplexer::new(scheduler, Duration::from_millis(5), strategy)
    }

    fn check_runs_due_work_while_idle(strategy: IdleStrategy) {
        let mux = multiplexer(strategy);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        mux.scheduler().schedule_in(
            Duration::from_millis(10),
            move |_: ()| -> Result<(), TaskError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            (),
        );

        let (mut transport, link) = MemoryTransport::pair();
        let byte = thread::scope(|scope| {
            scope.spawn(|| {
                while fired.load(Ordering::SeqCst) == 0 {
                    thread::sleep(Duration::from_millis(2));
                }
                link.send(&[0x7E]);
            });
            mux.next_byte(&mut transport)
        });

        assert_eq!(byte.unwrap(), 0x7E);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(mux.scheduler().pending(), 0);
    }

    #[test]
    fn test_poll_runs_due_work_while_idle() {
        check_runs_due_work_while_idle(IdleStrategy::Poll);
    }

    #[test]
    fn test_ticker_runs_due_work_while_idle() {
        check_runs_due_work_while_idle(IdleStrategy::Ticker);
    }

    #[test]
    fn test_bytes_arrive_in_order() {
        for strategy in [IdleStrategy::Poll, IdleStrategy::Ticker] {
            let mux = multiplexer(strategy);
            let (mut transport, link) = MemoryTransport::pair();
            link.send(&[1, 2, 3]);
            let bytes: Vec<u8> = (0..3).map(|_| mux.next_byte(&mut transport).unwrap()).collect();
            assert_eq!(bytes, vec![1, 2, 3]);
        }
    }

    #[test]
    fn test_closed_link_is_reported() {
        for strategy in [IdleStrategy::Poll, IdleStrategy::Ticker] {
            let mux = multiplexer(strategy);
            let (mut transport, mut link) = MemoryTransport::pair();
            link.close();
            assert!(matches!(
                mux.next_byte(&mut transport),
                Err(TransportError::Closed)
            ));
        }
    }

    #[test]
    fn test_strategy_from_yaml() {
        let strategy: IdleStrategy = serde_yaml::from_str("ticker").unwrap();
        assert_eq!(strategy, IdleStrategy::Ticker);
        assert_eq!(IdleStrategy::default(), IdleStrategy::Poll);
    }
}
