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

/// A vendor releasing tickets into the pool at a fixed pace.
///
/// Each vendor runs in its own thread: while the run is active and the
/// vendor still has tickets left to release, it attempts one production,
/// then waits out its release rate. The wait doubles as the cancellation
/// point — a [`WorkerCommand::Shutdown`] on the command channel wakes the
/// thread immediately and ends the loop.
///
/// When the vendor's allotment reaches zero it increments the run-wide
/// finished-vendor counter exactly once and the loop ends; no pool access
/// happens after that.
pub struct Vendor {
    /// Unique id for this vendor within the run.
    id: usize,

    /// Delay between release attempts.
    release_rate: Duration,

    /// Tickets this vendor will release over its lifetime.
    allotment: u64,

    /// Tickets successfully released so far. Shared so the registry can
    /// read the tally after the thread has exited.
    sold: Arc<AtomicU64>,

    /// The pool tickets are released into.
    pool: Arc<TicketPool>,

    /// Shared run lifecycle state (run-active flag, finished counter).
    run: Arc<RunState>,

    /// Destination for interruption events.
    sink: Arc<dyn EventSink>,

    /// Sender to control the vendor loop. `None` until `start`.
    tx: Option<Sender<WorkerCommand>>,

    /// Handle to the background thread running the vendor loop.
    /// Stored internally to allow joining the thread when stopping.
    thread_handle: Option<JoinHandle<()>>,
}

impl Vendor {
    /// Creates a vendor. The loop does not run until [`start`](Self::start)
    /// is called.
    pub fn new(
        id: usize,
        release_rate: Duration,
        allotment: u64,
        pool: Arc<TicketPool>,
        run: Arc<RunState>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            id,
            release_rate,
            allotment,
            sold: Arc::new(AtomicU64::new(0)),
            pool,
            run,
            sink,
            tx: None,
            thread_handle: None,
        }
    }

    /// Starts the vendor loop in a background thread.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        let (tx, rx) = channel();
        self.tx = Some(tx);

        let id = self.id;
        let pace = self.release_rate;
        let mut remaining = self.allotment;
        let sold = self.sold.clone();
        let pool = self.pool.clone();
        let run = self.run.clone();
        let sink = self.sink.clone();

        let handle = thread::spawn(move || {
            log::debug!("Vendor {} thread started ({} tickets to release)", id, remaining);

            // Nothing to release: report finished immediately so the run
            // can still terminate.
            if remaining == 0 {
                run.vendor_finished();
            }

            while run.is_running() && remaining > 0 {
                match pool.produce(id) {
                    Ok(true) => {
                        remaining -= 1;
                        sold.fetch_add(1, Ordering::SeqCst);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        log::error!("Vendor {} pool access failed: {}", id, e);
                        break;
                    }
                }

                if remaining == 0 {
                    run.vendor_finished();
                    log::info!("Vendor {} released all of its tickets", id);
                }
                log::debug!("Remaining tickets: {} for vendor {}", remaining, id);

                match rx.recv_timeout(pace) {
                    Ok(WorkerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                        log::info!("Vendor interrupted. Vendor ID: {}", id);
                        sink.message(&format!("Vendor {} interrupted", id));
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }

            log::debug!("Vendor {} thread ending", id);
        });
        self.thread_handle = Some(handle);

        Ok(())
    }

    /// Signals the vendor loop to stop and waits for the thread to finish.
    ///
    /// Stopping a vendor whose loop already exited is fine; the shutdown
    /// signal is simply discarded.
    pub fn stop(&mut self) -> Result<(), WorkerError> {
        match self.tx.take() {
            Some(tx) => {
                // The loop may have exited on its own; a dead channel is fine.
                let _ = tx.send(WorkerCommand::Shutdown);

                if let Some(handle) = self.thread_handle.take() {
                    if handle.join().is_err() {
                        log::warn!("Vendor {} thread panicked", self.id);
                    }
                }
                Ok(())
            }
            None => Err(WorkerError::NotStarted(format!(
                "vendor {} loop not started or already stopped",
                self.id
            ))),
        }
    }

    /// This vendor's id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of tickets this vendor has released so far.
    pub fn sold_count(&self) -> u64 {
        self.sold.load(Ordering::SeqCst)
    }
}

impl Drop for Vendor {
    fn drop(&mut self) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(WorkerCommand::Shutdown);
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl fmt::Debug for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vendor")
            .field("id", &self.id)
            .field("release_rate", &self.release_rate)
            .field("allotment", &self.allotment)
            .field("sold", &self.sold_count())
            // exclude sink
            .finish()
    }
}
