//! Dynamic tag registry and telemetry state store.
//!
//! Two cooperating halves: [`TagRegistry`] manages tag lifecycle
//! (create, soft-delete, write) against an external node tree behind
//! the [`NodeBackend`] seam, and [`TagStore`] holds live telemetry
//! values with per-tag bounded histories, manual override pinning, and
//! a simulated session. [`Ticker`] drives either half periodically
//! from a background thread.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod error;
pub mod history;
pub mod registry;
pub mod sim;
pub mod stats;
pub mod store;
pub mod tag;
pub mod ticker;

pub use backend::{NodeBackend, NodeError, NodeId, NodeSpec, SimulatedNodeBackend, OBJECTS_FOLDER};
pub use config::{MonitorConfig, TagConfig, DEFAULT_TICK_INTERVAL};
pub use error::TagError;
pub use history::{HistoryBuffer, HistorySample, DEFAULT_HISTORY_CAPACITY};
pub use registry::{CreateReport, DeleteReport, Tag, TagId, TagInit, TagRegistry};
pub use sim::{
    DriftProfile, MidpointGenerator, SimProfile, UniformGenerator, ValueGenerator, ValueRange,
    GENERIC_RANGE,
};
pub use stats::TagStatistics;
pub use store::TagStore;
pub use tag::{Quality, TagRecord};
pub use ticker::{Ticker, TickerHandle};
