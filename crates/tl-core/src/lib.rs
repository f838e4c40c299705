//! TerraLink core: the logic behind the disaster-response chat view.
//!
//! Local urgency triage, the append-only message log, the simulated peer
//! proximity walk and the force-directed mesh layout.
//!
//! Zero I/O. Randomness is always injected by the caller; the network
//! gateway and timers live in `tl-cli`.

pub mod console;
pub mod constants;
pub mod error;
pub mod message;
pub mod point;
pub mod proximity;
pub mod results;
pub mod time;
pub mod topology;
pub mod triage;
pub mod urgency;

pub use console::{Command, Console, Outcome};
pub use constants::{
    CENTER, CHARGE_STRENGTH, DEFAULT_PEERS, LINK_DISTANCE, MAX_STEP, MIN_DISTANCE, SOS_TEXT,
    TICK_PERIOD_MS, URGENCY_TOKENS,
};
pub use error::{CoreError, Result};
pub use message::{Message, MessageLog};
pub use point::Point;
pub use proximity::{Peer, ProximityEstimator, ProximitySnapshot};
pub use results::{ClassificationResult, CompressionResult, SummaryResult};
pub use time::{millis_to_iso8601, now_unix_millis};
pub use topology::{LayoutParams, LayoutSnapshot, TopologyGraph, TopologyProjector};
pub use triage::{TriageLabel, classify_offline};
pub use urgency::is_urgent;
