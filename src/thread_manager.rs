use crate::customer::Customer;
use crate::errors::ManagerError;
use crate::events::EventSink;
use crate::ticketing_system::RunState;
use crate::vendor::Vendor;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

/// Commands sent from the registry to a worker thread.
///
/// Workers receive these on their private command channel while waiting
/// out their pacing delay, so a command wakes a sleeping worker
/// immediately.
#[derive(Clone, Debug)]
pub enum WorkerCommand {
    /// Gracefully stop the worker loop.
    Shutdown,
}

/// Registry of the live vendor and customer workers.
///
/// Vendors and customers are tracked under independent locks so that
/// churn on one side never blocks bookkeeping on the other. The registry
/// is the only component that knows how workers are cancelled; workers
/// themselves only observe the shared run-active flag and their own
/// command channel.
pub struct ThreadManager {
    /// Active vendors, in registration order.
    vendors: Mutex<Vec<Vendor>>,

    /// Active customers, in registration order.
    customers: Mutex<Vec<Customer>>,

    /// Shared run lifecycle state, flipped inactive on `stop_all`.
    run: Arc<RunState>,

    /// Destination for membership events.
    sink: Arc<dyn EventSink>,
}

impl ThreadManager {
    /// Creates an empty registry bound to the given run state.
    pub fn new(run: Arc<RunState>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            vendors: Mutex::new(Vec::new()),
            customers: Mutex::new(Vec::new()),
            run,
            sink,
        }
    }

    /// Starts the vendor's loop and registers it.
    ///
    /// Safe to call at any time the run is active, including long after
    /// `start` returned — this is how mid-run dynamic membership works.
    /// Returns the new vendor count.
    pub fn add_vendor(&self, mut vendor: Vendor) -> Result<usize, ManagerError> {
        vendor.start()?;

        let mut vendors = self.lock_vendors()?;
        vendors.push(vendor);
        let count = vendors.len();

        log::info!("Vendor thread added. Total vendors: {}", count);
        self.sink
            .message(&format!("Vendor thread added. Total vendors: {}", count));
        Ok(count)
    }

    /// Starts the customer's loop and registers it.
    ///
    /// Returns the new customer count.
    pub fn add_customer(&self, mut customer: Customer) -> Result<usize, ManagerError> {
        customer.start()?;

        let mut customers = self.lock_customers()?;
        customers.push(customer);
        let count = customers.len();

        log::info!("Customer thread added. Total customers: {}", count);
        self.sink
            .message(&format!("Customer thread added. Total customers: {}", count));
        Ok(count)
    }

    /// Number of registered vendors.
    pub fn vendor_count(&self) -> Result<usize, ManagerError> {
        Ok(self.lock_vendors()?.len())
    }

    /// Number of registered customers.
    pub fn customer_count(&self) -> Result<usize, ManagerError> {
        Ok(self.lock_customers()?.len())
    }

    /// Stops every registered worker and clears both registries.
    ///
    /// The single authoritative shutdown path: flips the run-active flag
    /// first so no worker starts another pool attempt, then signals and
    /// joins each worker. Leaves no dangling registered handles.
    pub fn stop_all(&self) -> Result<(), ManagerError> {
        self.run.set_running(false);

        {
            let mut vendors = self.lock_vendors()?;
            for vendor in vendors.iter_mut() {
                if let Err(e) = vendor.stop() {
                    log::debug!("Vendor {} was already stopped: {}", vendor.id(), e);
                }
            }
            vendors.clear();
        }

        {
            let mut customers = self.lock_customers()?;
            for customer in customers.iter_mut() {
                if let Err(e) = customer.stop() {
                    log::debug!("Customer {} was already stopped: {}", customer.id(), e);
                }
            }
            customers.clear();
        }

        log::info!("All worker threads stopped and registries cleared");
        Ok(())
    }

    /// Moves out the join handles of all registered customers.
    ///
    /// A point-in-time snapshot for the coordinator's drain phase; the
    /// customers themselves stay registered so their tallies remain
    /// readable for the summary.
    pub fn take_customer_handles(&self) -> Result<Vec<JoinHandle<()>>, ManagerError> {
        let mut customers = self.lock_customers()?;
        Ok(customers
            .iter_mut()
            .filter_map(|customer| customer.take_handle())
            .collect())
    }

    /// `(id, sold)` snapshot of every registered vendor.
    pub fn vendor_tallies(&self) -> Result<Vec<(usize, u64)>, ManagerError> {
        let vendors = self.lock_vendors()?;
        Ok(vendors
            .iter()
            .map(|vendor| (vendor.id(), vendor.sold_count()))
            .collect())
    }

    /// `(id, removed)` snapshot of every registered customer.
    pub fn customer_tallies(&self) -> Result<Vec<(usize, u64)>, ManagerError> {
        let customers = self.lock_customers()?;
        Ok(customers
            .iter()
            .map(|customer| (customer.id(), customer.removed_count()))
            .collect())
    }

    fn lock_vendors(&self) -> Result<MutexGuard<'_, Vec<Vendor>>, ManagerError> {
        self.vendors
            .lock()
            .map_err(|_| ManagerError::LockFailed("vendor".into()))
    }

    fn lock_customers(&self) -> Result<MutexGuard<'_, Vec<Customer>>, ManagerError> {
        self.customers
            .lock()
            .map_err(|_| ManagerError::LockFailed("customer".into()))
    }
}

impl fmt::Debug for ThreadManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadManager")
            .field("vendors", &self.vendor_count().unwrap_or(0))
            .field("customers", &self.customer_count().unwrap_or(0))
            // exclude sink
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogSink;
    use crate::ticket_pool::TicketPool;
    use std::thread;
    use std::time::Duration;

    struct Fixture {
        pool: Arc<TicketPool>,
        run: Arc<RunState>,
        sink: Arc<dyn EventSink>,
        manager: ThreadManager,
    }

    fn create_test_fixture() -> Fixture {
        let sink: Arc<dyn EventSink> = Arc::new(LogSink);
        let pool = Arc::new(TicketPool::new(sink.clone()));
        pool.configure(100);
        let run = Arc::new(RunState::new());
        run.set_running(true);
        let manager = ThreadManager::new(run.clone(), sink.clone());
        Fixture {
            pool,
            run,
            sink,
            manager,
        }
    }

    fn test_vendor(f: &Fixture, id: usize, allotment: u64) -> Vendor {
        Vendor::new(
            id,
            Duration::from_millis(10),
            allotment,
            f.pool.clone(),
            f.run.clone(),
            f.sink.clone(),
        )
    }

    fn test_customer(f: &Fixture, id: usize) -> Customer {
        Customer::new(
            id,
            Duration::from_millis(10),
            f.pool.clone(),
            f.run.clone(),
            f.sink.clone(),
        )
    }

    #[test]
    fn test_add_and_count() {
        let f = create_test_fixture();

        assert_eq!(f.manager.add_vendor(test_vendor(&f, 1, 100)).unwrap(), 1);
        assert_eq!(f.manager.add_vendor(test_vendor(&f, 2, 100)).unwrap(), 2);
        assert_eq!(f.manager.add_customer(test_customer(&f, 1)).unwrap(), 1);

        assert_eq!(f.manager.vendor_count().unwrap(), 2);
        assert_eq!(f.manager.customer_count().unwrap(), 1);

        f.manager.stop_all().unwrap();
    }

    #[test]
    fn test_stop_all_clears_registries_and_flag() {
        let f = create_test_fixture();
        f.manager.add_vendor(test_vendor(&f, 1, 100)).unwrap();
        f.manager.add_customer(test_customer(&f, 1)).unwrap();

        thread::sleep(Duration::from_millis(30));
        f.manager.stop_all().unwrap();

        assert!(!f.run.is_running());
        assert_eq!(f.manager.vendor_count().unwrap(), 0);
        assert_eq!(f.manager.customer_count().unwrap(), 0);

        // Idempotent on an empty registry.
        f.manager.stop_all().unwrap();
    }

    #[test]
    fn test_tallies_reflect_worker_progress() {
        let f = create_test_fixture();
        f.manager.add_vendor(test_vendor(&f, 1, 2)).unwrap();

        thread::sleep(Duration::from_millis(100));
        let tallies = f.manager.vendor_tallies().unwrap();
        assert_eq!(tallies.len(), 1);
        assert_eq!(tallies[0], (1, 2));

        f.manager.stop_all().unwrap();
    }

    #[test]
    fn test_take_customer_handles_leaves_tallies_readable() {
        let f = create_test_fixture();
        f.manager.add_customer(test_customer(&f, 1)).unwrap();
        f.manager.add_customer(test_customer(&f, 2)).unwrap();

        f.run.set_running(false);
        let handles = f.manager.take_customer_handles().unwrap();
        assert_eq!(handles.len(), 2);
        for handle in handles {
            handle.join().unwrap();
        }

        // Handles are gone but the customers are still registered.
        assert_eq!(f.manager.customer_count().unwrap(), 2);
        assert_eq!(f.manager.customer_tallies().unwrap().len(), 2);
        assert!(f.manager.take_customer_handles().unwrap().is_empty());
    }
}
