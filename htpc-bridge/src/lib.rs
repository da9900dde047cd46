//! Controller-side bridge engine.
//!
//! One instance manages exactly one monitored host: it polls the hardware
//! monitor on a fixed cadence, keeps a last-known-good telemetry snapshot,
//! tracks host reachability, and translates remote-entity interactions into
//! agent commands or local actions (Wake-on-LAN, view selection). The
//! remote-control platform consumes [`context::BridgeContext`],
//! [`translator::EntitySet`] and [`telemetry::ViewModel`]; everything else
//! is internal plumbing.

pub mod agent;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod monitor;
pub mod poller;
pub mod state;
pub mod telemetry;
pub mod translator;
pub mod wol;

pub use config::DeviceConfig;
pub use connectivity::ConnectivityState;
pub use context::BridgeContext;
pub use telemetry::{ViewId, ViewModel};
pub use translator::{Directive, EntityCommand, EntitySet};
