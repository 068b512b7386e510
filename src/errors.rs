use thiserror::Error;

/// Errors returned by the [`TicketPool`](crate::ticket_pool::TicketPool).
///
/// Capacity conditions (pool full on produce, pool empty on consume) are
/// ordinary values, not errors; the only failure the pool itself can
/// report is a poisoned lock.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool mutex was poisoned by a panicking thread.
    #[error("Ticket pool lock poisoned during {0}")]
    Poisoned(String),
}

/// Errors related to individual vendor/customer workers.
///
/// Worker loops swallow their own faults (cancellation, pool errors) and
/// exit cleanly; this type only covers misuse of the worker handle.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The worker loop was never started or has already been stopped.
    #[error("Worker loop not started or already stopped: {0}")]
    NotStarted(String),
}

/// Errors returned from the [`ThreadManager`](crate::thread_manager::ThreadManager).
#[derive(Error, Debug)]
pub enum ManagerError {
    /// A worker registry lock could not be acquired.
    #[error("Failed to lock {0} registry")]
    LockFailed(String),

    /// A worker handle operation failed while registering or stopping.
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Errors returned from the
/// [`TicketingSystem`](crate::ticketing_system::TicketingSystem).
///
/// Invalid operations are reported as values and never panic across the
/// API boundary; external collaborators turn them into status responses.
#[derive(Error, Debug)]
pub enum SystemError {
    /// `start` was called while a run is already active.
    #[error("A run is already active")]
    AlreadyRunning,

    /// A worker was added while no run is active.
    #[error("No run is currently active")]
    NotRunning,

    /// `reset` was called while a run is still active.
    #[error("A run is still active; stop it before resetting")]
    RunActive,

    /// No configuration has been recorded yet.
    #[error("Configuration not found. Ensure the system is started first")]
    NoConfiguration,

    /// An internal lock could not be acquired.
    #[error("Failed to lock {0}")]
    LockFailed(String),

    /// A pool operation failed.
    #[error("Ticket pool error: {0}")]
    Pool(#[from] PoolError),

    /// A registry operation failed.
    #[error("Thread manager error: {0}")]
    Manager(#[from] ManagerError),
}

/// Errors produced when validating a
/// [`SimConfig`](crate::sim_config::SimConfig) before a run.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration field is out of its allowed range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by event sink callbacks.
///
/// Sinks never propagate these to the simulation; a failing callback is
/// logged and the run continues.
#[derive(Error, Debug)]
pub enum EventError {
    /// The user-provided callback returned an error.
    #[error("Event callback failed: {0}")]
    CallbackFailed(String),
}

/// High-level errors returned by the CLI binary.
///
/// These are used at the application entry point for formatting
/// user-facing error messages and wrapping lower-level failures.
#[derive(Error, Debug)]
pub enum CliError {
    /// General wrapper around any textual failure.
    #[error("Cli failed with error: {0}")]
    GeneralError(String),
}

impl From<SystemError> for CliError {
    fn from(err: SystemError) -> Self {
        CliError::GeneralError(err.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::GeneralError(err.to_string())
    }
}
