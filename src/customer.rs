use crate::errors::WorkerError;
use crate::events::EventSink;
use crate::thread_manager::WorkerCommand;
use crate::ticket_pool::TicketPool;
use crate::ticketing_system::RunState;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A customer retrieving tickets from the pool at a fixed pace.
///
/// The customer keeps attempting retrievals while the run is active OR the
/// pool still holds tickets — in that order, so remaining stock is drained
/// even after the run has been marked inactive. The loop ends only once
/// the run is inactive and the pool is empty, or on an explicit shutdown
/// command.
pub struct Customer {
    /// Unique id for this customer within the run.
    id: usize,

    /// Delay between retrieval attempts.
    retrieval_rate: Duration,

    /// Tickets successfully retrieved so far. Shared so the registry can
    /// read the tally after the thread has exited.
    removed: Arc<AtomicU64>,

    /// The pool tickets are retrieved from.
    pool: Arc<TicketPool>,

    /// Shared run lifecycle state.
    run: Arc<RunState>,

    /// Destination for the customer's quit notification.
    sink: Arc<dyn EventSink>,

    /// Sender to control the customer loop. `None` until `start`.
    tx: Option<Sender<WorkerCommand>>,

    /// Handle to the background thread running the customer loop.
    thread_handle: Option<JoinHandle<()>>,
}

impl Customer {
    /// Creates a customer. The loop does not run until
    /// [`start`](Self::start) is called.
    pub fn new(
        id: usize,
        retrieval_rate: Duration,
        pool: Arc<TicketPool>,
        run: Arc<RunState>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            id,
            retrieval_rate,
            removed: Arc::new(AtomicU64::new(0)),
            pool,
            run,
            sink,
            tx: None,
            thread_handle: None,
        }
    }

    /// Starts the customer loop in a background thread.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        let (tx, rx) = channel();
        self.tx = Some(tx);

        let id = self.id;
        let pace = self.retrieval_rate;
        let removed = self.removed.clone();
        let pool = self.pool.clone();
        let run = self.run.clone();
        let sink = self.sink.clone();

        let handle = thread::spawn(move || {
            log::debug!("Customer {} thread started", id);

            loop {
                // Two-part termination predicate: keep draining remaining
                // stock even after the run goes inactive.
                let active = run.is_running();
                let stocked = match pool.has_tickets() {
                    Ok(stocked) => stocked,
                    Err(e) => {
                        log::error!("Customer {} pool access failed: {}", id, e);
                        break;
                    }
                };
                if !active && !stocked {
                    break;
                }

                match pool.consume(id) {
                    Ok(Some(_ticket)) => {
                        removed.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log::error!("Customer {} pool access failed: {}", id, e);
                        break;
                    }
                }

                match rx.recv_timeout(pace) {
                    Ok(WorkerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                        log::info!("Customer interrupted! Customer ID: {}", id);
                        sink.message(&format!("Customer {} interrupted", id));
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }

            log::info!("No more tickets available. Customer thread ending. Customer ID: {}", id);
            sink.message(&format!("No more tickets! Customer {} quit", id));
        });
        self.thread_handle = Some(handle);

        Ok(())
    }

    /// Signals the customer loop to stop and waits for the thread to
    /// finish.
    pub fn stop(&mut self) -> Result<(), WorkerError> {
        match self.tx.take() {
            Some(tx) => {
                let _ = tx.send(WorkerCommand::Shutdown);

                if let Some(handle) = self.thread_handle.take() {
                    if handle.join().is_err() {
                        log::warn!("Customer {} thread panicked", self.id);
                    }
                }
                Ok(())
            }
            None => Err(WorkerError::NotStarted(format!(
                "customer {} loop not started or already stopped",
                self.id
            ))),
        }
    }

    /// Moves this customer's join handle out, if the loop was started and
    /// the handle has not been taken yet.
    ///
    /// Used by the coordinator to await drain completion at the end of a
    /// run without exposing the customer itself.
    pub fn take_handle(&mut self) -> Option<JoinHandle<()>> {
        self.thread_handle.take()
    }

    /// This customer's id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of tickets this customer has retrieved so far.
    pub fn removed_count(&self) -> u64 {
        self.removed.load(Ordering::SeqCst)
    }
}

impl Drop for Customer {
    fn drop(&mut self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(WorkerCommand::Shutdown);
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl fmt::Debug for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Customer")
            .field("id", &self.id)
            .field("retrieval_rate", &self.retrieval_rate)
            .field("removed", &self.removed_count())
            // exclude sink
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogSink;
    use std::time::Instant;

    fn create_test_fixture(capacity: usize) -> (Arc<TicketPool>, Arc<RunState>) {
        let sink: Arc<dyn EventSink> = Arc::new(LogSink);
        let pool = Arc::new(TicketPool::new(sink));
        pool.configure(capacity);
        (pool, Arc::new(RunState::new()))
    }

    fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_customer_drains_stock_after_run_inactive() {
        let (pool, run) = create_test_fixture(10);
        for _ in 0..3 {
            assert!(pool.produce(1).unwrap());
        }
        // Run already over, stock remains: the customer must drain it
        // before observing inactive-and-empty and leaving.
        assert!(!run.is_running());

        let mut customer = Customer::new(
            1,
            Duration::from_millis(1),
            pool.clone(),
            run.clone(),
            Arc::new(LogSink),
        );
        customer.start().unwrap();

        assert!(wait_until(Duration::from_secs(2), || {
            customer.removed_count() == 3
        }));
        assert!(wait_until(Duration::from_secs(1), || {
            pool.size().unwrap() == 0
        }));

        customer.stop().unwrap();
    }

    #[test]
    fn test_customer_exits_when_inactive_and_empty() {
        let (pool, run) = create_test_fixture(10);
        let mut customer = Customer::new(
            1,
            Duration::from_millis(1),
            pool,
            run,
            Arc::new(LogSink),
        );
        customer.start().unwrap();

        // The loop should fall through immediately; the handle joins on
        // its own without a shutdown signal.
        let handle = customer.take_handle().unwrap();
        handle.join().unwrap();
        assert_eq!(customer.removed_count(), 0);
    }

    #[test]
    fn test_customer_interrupted_while_run_active() {
        let (pool, run) = create_test_fixture(10);
        run.set_running(true);

        let mut customer = Customer::new(
            1,
            Duration::from_millis(20),
            pool,
            run.clone(),
            Arc::new(LogSink),
        );
        customer.start().unwrap();

        thread::sleep(Duration::from_millis(30));
        customer.stop().unwrap();
        assert_eq!(customer.removed_count(), 0);

        run.set_running(false);
    }
}
