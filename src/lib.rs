//! # Ticket Marketplace Simulation
//!
//! This crate implements a bounded ticket marketplace simulation:
//! vendor threads release tickets into a capacity-limited shared pool
//! while customer threads drain it, each side at its own configurable
//! pace. A coordinator owns the run lifecycle, detects the terminal
//! state (every vendor exhausted and the pool fully drained) and emits
//! an end-of-run summary.
//!
//! ## Features
//!
//! - Bounded, strictly FIFO ticket pool with atomic id generation.
//! - One thread per vendor/customer, paced by interruptible timed waits.
//! - Dynamic membership: vendors and customers can join a running
//!   simulation at any time.
//! - Coordinated stop and full reset between runs.
//! - Pluggable event sink for live notifications and the run summary.
//! - Thread-safe architecture using `Arc`, `Mutex`, and atomics.
//! - Logging support with configurable log levels.
//!
//! ## Architecture Overview
//!
//! The crate is organized into several modules:
//!
//! - [`ticket`](crate::ticket) — The immutable ticket value.
//! - [`ticket_pool`](crate::ticket_pool) — The bounded FIFO pool all
//!   workers share.
//! - [`vendor`](crate::vendor) / [`customer`](crate::customer) — The
//!   paced worker loops.
//! - [`thread_manager`](crate::thread_manager) — Registry of live
//!   workers, dynamic addition, coordinated stop.
//! - [`ticketing_system`](crate::ticketing_system) — Run lifecycle
//!   coordinator, termination detection, summary.
//! - [`events`](crate::events) — The event sink abstraction external
//!   collaborators plug into.
//! - [`sim_config`](crate::sim_config) — The per-run configuration
//!   snapshot.
//! - [`defs`](crate::defs) — Shared constants and timing parameters.
//! - [`errors`](crate::errors) — Error types used across modules.
//!
//! ## Termination
//!
//! A run ends naturally once every vendor has exhausted its allotment
//! AND the pool is empty. Customers keep draining remaining stock after
//! the run is marked inactive; the coordinator waits for them before
//! emitting the summary. An explicit [`stop`] is an abort: workers are
//! cancelled and no summary is produced.
//!
//! [`stop`]: crate::ticketing_system::TicketingSystem::stop
//!
//! ## Example: Running a Simulation
//!
//! ```no_run
//! use std::sync::Arc;
//! use ticket_sim::events::LogSink;
//! use ticket_sim::sim_config::SimConfig;
//! use ticket_sim::ticketing_system::TicketingSystem;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = TicketingSystem::new(Arc::new(LogSink));
//!
//!     system.start(SimConfig {
//!         vendor_count: 2,
//!         customer_count: 2,
//!         total_tickets: 20,
//!         release_rate_ms: 500,
//!         retrieval_rate_ms: 500,
//!         max_capacity: 10,
//!     })?;
//!
//!     // Blocks until all tickets have been sold and retrieved.
//!     system.wait_for_completion()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unreachable_pub)]

pub mod customer;
pub mod defs;
pub mod errors;
pub mod events;
pub mod sim_config;
pub mod thread_manager;
pub mod ticket;
pub mod ticket_pool;
pub mod ticketing_system;
pub mod vendor;
