//! tether - stateless control relay for remote agents.
//!
//! A controller web client observes and drives remote agent processes through
//! a plain HTTP boundary. The relay itself holds no session state: every
//! operation is a short read-modify-write sequence against a shared key-value
//! store, so any number of relay instances (or a single serverless handler)
//! can serve the same fleet.
//!
//! Three components cover the whole lifecycle:
//!
//! - [`registry`] - which agents exist and which are currently alive,
//!   derived from time since last contact rather than a stored flag.
//! - [`screen`] - a single-slot, TTL-bound cache of the most recent captured
//!   frame per agent.
//! - [`queue`] - a per-agent FIFO of pending commands, acknowledged (and
//!   deleted) by the agent after execution.
//!
//! The [`api`] module wires the components into the HTTP surface; [`store`]
//! supplies the key-value backends and the per-key locking that keeps
//! concurrent read-modify-write sequences from losing updates.

pub mod api;
pub mod clock;
pub mod config;
pub mod queue;
pub mod registry;
pub mod screen;
pub mod store;
