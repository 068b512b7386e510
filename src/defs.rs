/// Event name given to every ticket minted by the pool.
///
/// Tickets carry no identity beyond their id; the name exists so that
/// log lines and sink events read like the marketplace they simulate.
pub const DEFAULT_TICKET_NAME: &str = "Sample Event";

/// Run monitor poll period in milliseconds.
///
/// The monitor thread wakes at this interval to evaluate the termination
/// predicate (all vendors exhausted and the pool drained) and to notice
/// an explicit stop.
/// Lower values reduce end-of-run latency but increase CPU usage.
pub const MONITOR_TICK_PERIOD_MSEC: u64 = 100;

/// Poll period (in milliseconds) used by binaries that report live pool
/// occupancy while a run is active.
///
/// This only paces observation; it has no effect on the simulation itself.
pub const STATUS_POLL_PERIOD_MSEC: u64 = 500;
