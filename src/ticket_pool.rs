use crate::errors::PoolError;
use crate::events::EventSink;
use crate::ticket::Ticket;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// The bounded, thread-safe FIFO pool of tickets shared by all workers.
///
/// Vendors append freshly minted tickets; customers remove the oldest.
/// Every size-check-then-mutate sequence runs inside a single pool-wide
/// critical section, so the pool never exceeds its configured capacity and
/// consumption order always matches production order.
///
/// Capacity conditions are ordinary outcomes, not errors: `produce` on a
/// full pool returns `Ok(false)` and `consume` on an empty pool returns
/// `Ok(None)`, each with an informational event for the sink. Callers are
/// expected to retry after their pacing delay rather than block inside
/// the call — that keeps every worker free to observe cancellation.
pub struct TicketPool {
    /// FIFO queue of live tickets, guarded by the pool-wide lock.
    tickets: Mutex<VecDeque<Ticket>>,

    /// Maximum queue length. Set by `configure` before a run starts.
    capacity: AtomicUsize,

    /// Next ticket id to mint. Only ever incremented, except by
    /// `reset_id_counter`.
    next_id: AtomicU64,

    /// Destination for produce/consume/full/empty events.
    sink: Arc<dyn EventSink>,
}

impl TicketPool {
    /// Creates an empty, zero-capacity pool.
    ///
    /// Call [`configure`](Self::configure) before the first run.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            tickets: Mutex::new(VecDeque::new()),
            capacity: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            sink,
        }
    }

    /// Sets the maximum pool size.
    ///
    /// Not safe to call concurrently with producer/consumer activity; the
    /// coordinator calls it before spawning workers.
    pub fn configure(&self, max_capacity: usize) {
        log::info!("Ticket pool configured with capacity {}", max_capacity);
        self.capacity.store(max_capacity, Ordering::SeqCst);
    }

    /// Attempts to append one freshly minted ticket on behalf of a vendor.
    ///
    /// Returns `Ok(false)` without mutation iff the pool is at capacity.
    pub fn produce(&self, vendor_id: usize) -> Result<bool, PoolError> {
        let mut tickets = self.lock("produce")?;

        if tickets.len() >= self.capacity.load(Ordering::SeqCst) {
            log::debug!("Ticket pool is full for vendor {}", vendor_id);
            self.sink
                .message(&format!("Ticket pool is full for vendor {}", vendor_id));
            return Ok(false);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let ticket = Ticket::new(id);

        log::info!("Vendor {} added 1 ticket to the pool ({})", vendor_id, ticket);
        self.sink
            .message(&format!("Vendor {} added 1 ticket: {}", vendor_id, ticket));

        tickets.push_back(ticket);
        log::debug!("Current ticket pool size: {}", tickets.len());

        Ok(true)
    }

    /// Attempts to remove and return the oldest ticket on behalf of a
    /// customer.
    ///
    /// Returns `Ok(None)` iff the pool is empty at the time of the attempt.
    pub fn consume(&self, customer_id: usize) -> Result<Option<Ticket>, PoolError> {
        let mut tickets = self.lock("consume")?;

        let ticket = match tickets.pop_front() {
            Some(ticket) => ticket,
            None => {
                log::debug!("Ticket pool is empty for customer {}", customer_id);
                self.sink
                    .message(&format!("Ticket pool is empty for customer {}", customer_id));
                return Ok(None);
            }
        };

        log::info!(
            "Customer {} removed 1 ticket from the pool ({})",
            customer_id,
            ticket
        );
        self.sink
            .message(&format!("Customer {} removed 1 ticket: {}", customer_id, ticket));

        Ok(Some(ticket))
    }

    /// Whether the pool currently holds any tickets.
    pub fn has_tickets(&self) -> Result<bool, PoolError> {
        Ok(!self.lock("has_tickets")?.is_empty())
    }

    /// Current number of tickets in the pool.
    pub fn size(&self) -> Result<usize, PoolError> {
        Ok(self.lock("size")?.len())
    }

    /// Clears all tickets.
    ///
    /// Called together with [`reset_id_counter`](Self::reset_id_counter)
    /// at the start of a fresh run, while no workers are active.
    pub fn reset_pool(&self) -> Result<(), PoolError> {
        self.lock("reset_pool")?.clear();
        log::debug!("Ticket pool cleared");
        Ok(())
    }

    /// Resets the ticket id counter to 1.
    pub fn reset_id_counter(&self) {
        self.next_id.store(1, Ordering::SeqCst);
    }

    fn lock(&self, op: &str) -> Result<MutexGuard<'_, VecDeque<Ticket>>, PoolError> {
        self.tickets
            .lock()
            .map_err(|_| PoolError::Poisoned(op.to_string()))
    }
}

impl fmt::Debug for TicketPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketPool")
            .field("size", &self.tickets.lock().map(|t| t.len()).unwrap_or(0))
            .field("capacity", &self.capacity.load(Ordering::SeqCst))
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish()
    }
}
