use crate::customer::Customer;
use crate::defs::MONITOR_TICK_PERIOD_MSEC;
use crate::errors::{SystemError, ManagerError};
use crate::events::{EventSink, LogSink, RunSummary};
use crate::sim_config::SimConfig;
use crate::thread_manager::ThreadManager;
use crate::ticket_pool::TicketPool;
use crate::vendor::Vendor;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shared run lifecycle state.
///
/// One instance per [`TicketingSystem`], handed by `Arc` to every worker
/// and to the monitor thread. Workers never reference each other; this
/// flag pair and the pool are their only shared state.
#[derive(Debug)]
pub struct RunState {
    /// Whether a run is currently active.
    running: AtomicBool,

    /// Number of vendors that have exhausted their allotment this run.
    finished_vendors: AtomicUsize,
}

impl RunState {
    /// Creates an idle run state (not running, zero finished vendors).
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            finished_vendors: AtomicUsize::new(0),
        }
    }

    /// Whether a run is currently active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Flips the run-active flag.
    pub fn set_running(&self, active: bool) {
        self.running.store(active, Ordering::SeqCst);
    }

    /// Records that one more vendor has exhausted its allotment.
    ///
    /// Each vendor calls this exactly once, when its remaining count
    /// reaches zero.
    pub fn vendor_finished(&self) {
        self.finished_vendors.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of vendors that have finished this run.
    pub fn finished_vendors(&self) -> usize {
        self.finished_vendors.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.finished_vendors.store(0, Ordering::SeqCst);
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// The run lifecycle coordinator.
///
/// Owns the pool, the worker registry, the shared run state and the
/// current configuration. `start` spawns the configured workers plus a
/// monitor thread that detects the terminal state (every vendor exhausted
/// AND the pool drained), waits for customers to finish draining, and
/// emits the end-of-run summary. `stop` is an explicit abort; `reset`
/// restores idle state between runs.
///
/// All operations return results rather than panicking, so external
/// collaborators (HTTP handlers, CLIs) can map them directly to status
/// responses.
pub struct TicketingSystem {
    /// The shared bounded ticket pool.
    pool: Arc<TicketPool>,

    /// Registry of live workers.
    manager: Arc<ThreadManager>,

    /// Shared lifecycle flags.
    run: Arc<RunState>,

    /// Configuration of the current (or most recent) run. Retained so
    /// dynamically added workers match the active run.
    config: Mutex<Option<SimConfig>>,

    /// Destination for run-level events and the summary.
    sink: Arc<dyn EventSink>,

    /// Monitor thread handle, present while a run is active or has not
    /// been reaped yet.
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl TicketingSystem {
    /// Creates an idle system delivering events to the given sink.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        let run = Arc::new(RunState::new());
        let pool = Arc::new(TicketPool::new(sink.clone()));
        let manager = Arc::new(ThreadManager::new(run.clone(), sink.clone()));

        Self {
            pool,
            manager,
            run,
            config: Mutex::new(None),
            sink,
            monitor: Mutex::new(None),
        }
    }

    /// Starts a run from the given configuration.
    ///
    /// Clears any remnants of a previous run (pool contents, id counter,
    /// finished-vendor counter, registered workers), spawns
    /// `config.vendor_count` vendors — each allotted an even share of the
    /// total ticket budget — and `config.customer_count` customers, then
    /// launches the monitor thread and returns.
    ///
    /// Fails with [`SystemError::AlreadyRunning`] while a run is active.
    pub fn start(&self, config: SimConfig) -> Result<(), SystemError> {
        if self.run.is_running() {
            return Err(SystemError::AlreadyRunning);
        }

        // A naturally completed run leaves its finished workers registered
        // so the summary could read them; clear them before spawning anew.
        self.manager.stop_all()?;
        self.reset_state()?;
        self.pool.configure(config.max_capacity);

        {
            let mut current = self
                .config
                .lock()
                .map_err(|_| SystemError::LockFailed("configuration".into()))?;
            *current = Some(config.clone());
        }

        self.run.set_running(true);

        let share = config.tickets_per_vendor();
        let release_rate = Duration::from_millis(config.release_rate_ms);
        for i in 0..config.vendor_count {
            let vendor = Vendor::new(
                i + 1,
                release_rate,
                share,
                self.pool.clone(),
                self.run.clone(),
                self.sink.clone(),
            );
            self.manager.add_vendor(vendor)?;
        }

        let retrieval_rate = Duration::from_millis(config.retrieval_rate_ms);
        for i in 0..config.customer_count {
            let customer = Customer::new(
                i + 1,
                retrieval_rate,
                self.pool.clone(),
                self.run.clone(),
                self.sink.clone(),
            );
            self.manager.add_customer(customer)?;
        }

        self.spawn_monitor()?;

        log::info!(
            "Ticketing run started: {} vendors x {} tickets, {} customers, capacity {}",
            config.vendor_count,
            share,
            config.customer_count,
            config.max_capacity
        );
        Ok(())
    }

    /// Stops the run immediately.
    ///
    /// An explicit abort: every worker is cancelled, the registries are
    /// cleared and no summary is generated. Safe to call repeatedly or
    /// when no run is active.
    pub fn stop(&self) -> Result<(), SystemError> {
        log::info!("Stopping ticketing run");
        self.manager.stop_all()?;

        let handle = {
            let mut guard = self
                .monitor
                .lock()
                .map_err(|_| SystemError::LockFailed("monitor".into()))?;
            guard.take()
        };
        match handle {
            Some(handle) => {
                if handle.join().is_err() {
                    log::warn!("Run monitor thread panicked");
                }
            }
            None => log::debug!("No run monitor to stop"),
        }

        self.sink.message("Ticketing system stopped");
        Ok(())
    }

    /// Restores idle state: empty pool, ticket ids back at 1, zero
    /// finished vendors.
    ///
    /// Rejected while a run is active — stop first.
    pub fn reset(&self) -> Result<(), SystemError> {
        if self.run.is_running() {
            return Err(SystemError::RunActive);
        }
        self.reset_state()
    }

    /// Adds one vendor to the active run, configured from the retained
    /// run configuration (same even share as the initial vendors).
    ///
    /// Returns the new vendor count. Rejected when no run is active or no
    /// configuration has been recorded.
    pub fn add_vendor(&self) -> Result<usize, SystemError> {
        if !self.run.is_running() {
            return Err(SystemError::NotRunning);
        }
        let config = self.current_config()?.ok_or(SystemError::NoConfiguration)?;

        let id = self.manager.vendor_count()? + 1;
        let vendor = Vendor::new(
            id,
            Duration::from_millis(config.release_rate_ms),
            config.tickets_per_vendor(),
            self.pool.clone(),
            self.run.clone(),
            self.sink.clone(),
        );
        Ok(self.manager.add_vendor(vendor)?)
    }

    /// Adds one customer to the active run, configured from the retained
    /// run configuration.
    ///
    /// Returns the new customer count. Rejected when no run is active or
    /// no configuration has been recorded.
    pub fn add_customer(&self) -> Result<usize, SystemError> {
        if !self.run.is_running() {
            return Err(SystemError::NotRunning);
        }
        let config = self.current_config()?.ok_or(SystemError::NoConfiguration)?;

        let id = self.manager.customer_count()? + 1;
        let customer = Customer::new(
            id,
            Duration::from_millis(config.retrieval_rate_ms),
            self.pool.clone(),
            self.run.clone(),
            self.sink.clone(),
        );
        Ok(self.manager.add_customer(customer)?)
    }

    /// Whether a run is currently active.
    pub fn is_running(&self) -> bool {
        self.run.is_running()
    }

    /// Current number of tickets in the pool.
    pub fn pool_size(&self) -> Result<usize, SystemError> {
        Ok(self.pool.size()?)
    }

    /// Number of registered vendors.
    pub fn vendor_count(&self) -> Result<usize, SystemError> {
        Ok(self.manager.vendor_count()?)
    }

    /// Number of registered customers.
    pub fn customer_count(&self) -> Result<usize, SystemError> {
        Ok(self.manager.customer_count()?)
    }

    /// The configuration of the current (or most recent) run, if any.
    pub fn current_config(&self) -> Result<Option<SimConfig>, SystemError> {
        Ok(self
            .config
            .lock()
            .map_err(|_| SystemError::LockFailed("configuration".into()))?
            .clone())
    }

    /// Blocks until the monitor thread ends — that is, until the run
    /// reaches its natural terminal state (or was stopped from another
    /// thread) and the summary has been emitted.
    pub fn wait_for_completion(&self) -> Result<(), SystemError> {
        let handle = {
            let mut guard = self
                .monitor
                .lock()
                .map_err(|_| SystemError::LockFailed("monitor".into()))?;
            guard.take()
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::warn!("Run monitor thread panicked");
            }
        }
        Ok(())
    }

    fn reset_state(&self) -> Result<(), SystemError> {
        self.run.reset();
        self.pool.reset_id_counter();
        self.pool.reset_pool()?;
        Ok(())
    }

    /// Spawns the monitor thread for the run just configured.
    ///
    /// The monitor polls the termination predicate — every vendor finished
    /// AND pool empty — every [`MONITOR_TICK_PERIOD_MSEC`]. On the
    /// predicate it flips the run inactive, waits for the customers to
    /// finish draining, and emits the summary. An explicit stop makes it
    /// exit without a summary.
    fn spawn_monitor(&self) -> Result<(), SystemError> {
        let mut guard = self
            .monitor
            .lock()
            .map_err(|_| SystemError::LockFailed("monitor".into()))?;

        // Reap the previous run's monitor; it has already finished.
        if let Some(stale) = guard.take() {
            let _ = stale.join();
        }

        let pool = self.pool.clone();
        let manager = self.manager.clone();
        let run = self.run.clone();
        let sink = self.sink.clone();

        let handle = thread::spawn(move || {
            log::debug!("Run monitor started");
            loop {
                thread::sleep(Duration::from_millis(MONITOR_TICK_PERIOD_MSEC));

                if !run.is_running() {
                    log::debug!("Run monitor observed explicit stop");
                    return;
                }

                let vendor_count = match manager.vendor_count() {
                    Ok(count) => count,
                    Err(e) => {
                        log::error!("Run monitor lost the vendor registry: {}", e);
                        return;
                    }
                };
                let pool_size = match pool.size() {
                    Ok(size) => size,
                    Err(e) => {
                        log::error!("Run monitor lost the ticket pool: {}", e);
                        return;
                    }
                };

                if run.finished_vendors() >= vendor_count && pool_size == 0 {
                    run.set_running(false);
                    log::info!("All tickets sold out! Customers purchasing tickets if remaining...");
                    sink.message("Tickets sold out! Customers purchasing remaining");
                    break;
                }
            }

            // Let every customer observe inactive-and-empty before the
            // summary reads their tallies.
            match manager.take_customer_handles() {
                Ok(handles) => {
                    for handle in handles {
                        if handle.join().is_err() {
                            log::warn!("Customer thread panicked while draining");
                        }
                    }
                }
                Err(e) => log::warn!("Could not snapshot customer handles: {}", e),
            }

            match build_summary(&manager, &run) {
                Ok(summary) => {
                    log::info!("Run summary: {:?}", summary);
                    sink.summary(&summary);
                }
                Err(e) => log::warn!("Could not build run summary: {}", e),
            }
            sink.message("Simulation ended");
            log::info!("Simulation ended");
        });
        *guard = Some(handle);

        Ok(())
    }
}

/// Builds the end-of-run summary from the registered workers' tallies.
fn build_summary(manager: &ThreadManager, run: &RunState) -> Result<RunSummary, ManagerError> {
    let mut summary = RunSummary::new();
    let mut total_sold = 0;

    let customer_tallies = manager.customer_tallies()?;
    for (id, removed) in &customer_tallies {
        total_sold += removed;
        summary.insert(format!("Customer {}", id), *removed);
    }
    for (id, sold) in manager.vendor_tallies()? {
        summary.insert(format!("Vendor {}", id), sold);
    }

    summary.insert("Total tickets sold".into(), total_sold);
    summary.insert(
        "Total customers served".into(),
        customer_tallies.len() as u64,
    );
    summary.insert("Total vendors used".into(), run.finished_vendors() as u64);

    Ok(summary)
}

impl Default for TicketingSystem {
    fn default() -> Self {
        Self::new(Arc::new(LogSink))
    }
}

impl Drop for TicketingSystem {
    fn drop(&mut self) {
        log::debug!("TicketingSystem drop called, stopping any active run");
        let _ = self.stop();
    }
}

impl fmt::Debug for TicketingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketingSystem")
            .field("running", &self.run.is_running())
            .field("pool", &self.pool)
            .field("manager", &self.manager)
            // exclude sink
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Sink that records everything for assertions.
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
        summaries: Mutex<Vec<RunSummary>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: Mutex::new(Vec::new()),
                summaries: Mutex::new(Vec::new()),
            })
        }

        fn has_message(&self, needle: &str) -> bool {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .any(|m| m.contains(needle))
        }

        fn summary_count(&self) -> usize {
            self.summaries.lock().unwrap().len()
        }

        fn last_summary(&self) -> RunSummary {
            self.summaries.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl EventSink for RecordingSink {
        fn message(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }

        fn summary(&self, summary: &RunSummary) {
            self.summaries.lock().unwrap().push(summary.clone());
        }
    }

    fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn small_config() -> SimConfig {
        SimConfig {
            vendor_count: 1,
            customer_count: 1,
            total_tickets: 3,
            release_rate_ms: 10,
            retrieval_rate_ms: 15,
            max_capacity: 5,
        }
    }

    #[test]
    fn test_run_to_completion_produces_summary() {
        let sink = RecordingSink::new();
        let system = TicketingSystem::new(sink.clone());

        system.start(small_config()).unwrap();
        assert!(system.is_running());

        assert!(wait_until(Duration::from_secs(5), || !system.is_running()));
        system.wait_for_completion().unwrap();

        assert_eq!(system.pool_size().unwrap(), 0);

        let summary = sink.last_summary();
        assert_eq!(summary.get("Vendor 1"), Some(&3));
        assert_eq!(summary.get("Customer 1"), Some(&3));
        assert_eq!(summary.get("Total tickets sold"), Some(&3));
        assert_eq!(summary.get("Total customers served"), Some(&1));
        assert_eq!(summary.get("Total vendors used"), Some(&1));
        assert!(sink.has_message("Simulation ended"));
    }

    #[test]
    fn test_even_split_across_vendors() {
        let sink = RecordingSink::new();
        let system = TicketingSystem::new(sink.clone());

        let config = SimConfig {
            vendor_count: 2,
            customer_count: 2,
            total_tickets: 4,
            release_rate_ms: 5,
            retrieval_rate_ms: 5,
            max_capacity: 10,
        };
        system.start(config).unwrap();

        assert!(wait_until(Duration::from_secs(5), || !system.is_running()));
        system.wait_for_completion().unwrap();

        let summary = sink.last_summary();
        assert_eq!(summary.get("Vendor 1"), Some(&2));
        assert_eq!(summary.get("Vendor 2"), Some(&2));
        assert_eq!(summary.get("Total tickets sold"), Some(&4));
        assert_eq!(summary.get("Total vendors used"), Some(&2));
    }

    #[test]
    fn test_consumerless_full_pool_stalls_forever() {
        let sink = RecordingSink::new();
        let system = TicketingSystem::new(sink.clone());

        // Capacity 1, two vendors with stock remaining, nobody draining:
        // the pool pins at one ticket and the run can never terminate on
        // its own. Inherited marketplace semantics, reproduced on purpose.
        let config = SimConfig {
            vendor_count: 2,
            customer_count: 0,
            total_tickets: 4,
            release_rate_ms: 5,
            retrieval_rate_ms: 5,
            max_capacity: 1,
        };
        system.start(config).unwrap();

        thread::sleep(Duration::from_millis(400));
        assert!(system.is_running());
        assert_eq!(system.pool_size().unwrap(), 1);
        assert_eq!(system.run.finished_vendors(), 0);
        assert_eq!(sink.summary_count(), 0);

        system.stop().unwrap();
        assert!(!system.is_running());
        assert_eq!(sink.summary_count(), 0);
    }

    #[test]
    fn test_dynamic_customer_drains_leftover_stock() {
        let sink = RecordingSink::new();
        let system = TicketingSystem::new(sink.clone());

        let config = SimConfig {
            vendor_count: 1,
            customer_count: 0,
            total_tickets: 3,
            release_rate_ms: 1,
            retrieval_rate_ms: 1,
            max_capacity: 10,
        };
        system.start(config).unwrap();

        // Vendor exhausts its allotment; stock sits in the pool and the
        // run stays active because the pool is not empty.
        assert!(wait_until(Duration::from_secs(2), || {
            system.run.finished_vendors() == 1 && system.pool_size().unwrap() == 3
        }));
        thread::sleep(Duration::from_millis(250));
        assert!(system.is_running());

        assert_eq!(system.add_customer().unwrap(), 1);

        assert!(wait_until(Duration::from_secs(5), || !system.is_running()));
        system.wait_for_completion().unwrap();

        assert_eq!(system.pool_size().unwrap(), 0);
        let summary = sink.last_summary();
        assert_eq!(summary.get("Customer 1"), Some(&3));
    }

    #[test]
    fn test_add_rejected_when_not_running() {
        let system = TicketingSystem::new(RecordingSink::new());
        assert!(matches!(
            system.add_vendor(),
            Err(SystemError::NotRunning)
        ));
        assert!(matches!(
            system.add_customer(),
            Err(SystemError::NotRunning)
        ));
    }

    #[test]
    fn test_start_rejected_while_running() {
        let system = TicketingSystem::new(RecordingSink::new());
        let config = SimConfig {
            vendor_count: 1,
            customer_count: 1,
            total_tickets: 1000,
            release_rate_ms: 50,
            retrieval_rate_ms: 50,
            max_capacity: 10,
        };
        system.start(config.clone()).unwrap();
        assert!(matches!(
            system.start(config),
            Err(SystemError::AlreadyRunning)
        ));
        system.stop().unwrap();
    }

    #[test]
    fn test_stop_is_an_abort_without_summary() {
        let sink = RecordingSink::new();
        let system = TicketingSystem::new(sink.clone());

        let config = SimConfig {
            vendor_count: 2,
            customer_count: 2,
            total_tickets: 10_000,
            release_rate_ms: 20,
            retrieval_rate_ms: 20,
            max_capacity: 50,
        };
        system.start(config).unwrap();
        thread::sleep(Duration::from_millis(80));

        system.stop().unwrap();

        assert!(!system.is_running());
        assert_eq!(system.vendor_count().unwrap(), 0);
        assert_eq!(system.customer_count().unwrap(), 0);
        assert_eq!(sink.summary_count(), 0);
        assert!(sink.has_message("Ticketing system stopped"));
    }

    #[test]
    fn test_reset_rejected_mid_run_and_idempotent_after() {
        let system = TicketingSystem::new(RecordingSink::new());
        let config = SimConfig {
            vendor_count: 1,
            customer_count: 1,
            total_tickets: 1000,
            release_rate_ms: 50,
            retrieval_rate_ms: 50,
            max_capacity: 10,
        };
        system.start(config).unwrap();
        assert!(matches!(system.reset(), Err(SystemError::RunActive)));
        system.stop().unwrap();

        // Twice in a row is the same as once.
        system.reset().unwrap();
        system.reset().unwrap();
        assert_eq!(system.pool_size().unwrap(), 0);
        assert_eq!(system.run.finished_vendors(), 0);
        assert!(system.pool.produce(1).unwrap());
        assert_eq!(system.pool.consume(1).unwrap().unwrap().id, 1);
    }

    #[test]
    fn test_restart_after_natural_end() {
        let sink = RecordingSink::new();
        let system = TicketingSystem::new(sink.clone());

        system.start(small_config()).unwrap();
        assert!(wait_until(Duration::from_secs(5), || !system.is_running()));
        system.wait_for_completion().unwrap();

        // A fresh run must not inherit the previous run's workers or ids.
        system.start(small_config()).unwrap();
        assert_eq!(system.vendor_count().unwrap(), 1);
        assert_eq!(system.customer_count().unwrap(), 1);

        assert!(wait_until(Duration::from_secs(5), || !system.is_running()));
        system.wait_for_completion().unwrap();

        assert_eq!(sink.summary_count(), 2);
        let summary = sink.last_summary();
        assert_eq!(summary.get("Total tickets sold"), Some(&3));
    }
}
