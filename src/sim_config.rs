use crate::errors::ConfigError;

/// Immutable configuration snapshot for one simulation run.
///
/// Supplied to [`TicketingSystem::start`](crate::ticketing_system::TicketingSystem::start)
/// and retained for the duration of the run so that dynamically added
/// workers are configured consistently with the workers spawned at start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// Number of vendor threads spawned at start.
    pub vendor_count: usize,

    /// Number of customer threads spawned at start.
    pub customer_count: usize,

    /// Total ticket budget for the run, split evenly across vendors.
    pub total_tickets: u64,

    /// Delay between a vendor's release attempts, in milliseconds.
    pub release_rate_ms: u64,

    /// Delay between a customer's retrieval attempts, in milliseconds.
    pub retrieval_rate_ms: u64,

    /// Maximum number of tickets the pool may hold at once.
    pub max_capacity: usize,
}

impl SimConfig {
    /// Each vendor's share of the total ticket budget.
    ///
    /// Even split: `total_tickets / vendor_count`, integer division. The
    /// fractional remainder is never minted. Dynamically added vendors
    /// receive the same share.
    pub fn tickets_per_vendor(&self) -> u64 {
        if self.vendor_count == 0 {
            0
        } else {
            self.total_tickets / self.vendor_count as u64
        }
    }

    /// Checks the configuration before a run.
    ///
    /// The core itself accepts any configuration (termination behavior with
    /// degenerate values is documented rather than prevented); binaries and
    /// other collaborators are expected to call this before `start`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vendor_count == 0 {
            return Err(ConfigError::Invalid(
                "number of vendors must be positive".into(),
            ));
        }
        if self.customer_count == 0 {
            return Err(ConfigError::Invalid(
                "number of customers must be positive".into(),
            ));
        }
        if self.total_tickets == 0 {
            return Err(ConfigError::Invalid(
                "total tickets must be positive".into(),
            ));
        }
        if self.total_tickets < self.vendor_count as u64 {
            return Err(ConfigError::Invalid(format!(
                "total tickets ({}) must be at least the number of vendors ({})",
                self.total_tickets, self.vendor_count
            )));
        }
        if self.release_rate_ms == 0 || self.retrieval_rate_ms == 0 {
            return Err(ConfigError::Invalid(
                "release and retrieval rates must be positive".into(),
            ));
        }
        if self.max_capacity == 0 {
            return Err(ConfigError::Invalid(
                "maximum pool capacity must be positive".into(),
            ));
        }
        Ok(())
    }
}
