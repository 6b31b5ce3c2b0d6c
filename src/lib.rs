//! # Sensor Uplink
//!
//! Buffering and scheduling core of a data-acquisition node:
//! producer → threshold filter → bounded queue → (wake) → transmitter → transport.
//!
//! The transmitter stays parked until one of three triggers fires:
//! - the queue fills up,
//! - a reading lands outside the critical band,
//! - the periodic timer expires with readings waiting.
//!
//! Each wake is one flush cycle: drain the queue in batches, pack records
//! into a fixed-size buffer, send, park again.

pub mod component_a;
pub mod component_b;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod reading;
pub mod uplink;
pub mod utils;

pub use component_a::filter::{Classification, Tolerance, classify};
pub use component_b::scheduler::{Lifecycle, WakeReason};
pub use component_b::transport::{Connection, MemoryTransport, TcpTransport, Transport};
pub use config::PipelineConfig;
pub use error::{SubmitError, TransportError, UplinkError, UplinkResult};
pub use pipeline::{Admission, Pipeline};
pub use reading::{Reading, WireFormat};
pub use uplink::Uplink;
pub use utils::stats::StatsSnapshot;
