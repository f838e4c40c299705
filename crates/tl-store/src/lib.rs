pub mod config;
pub mod error;
pub mod journal;
pub mod schema;

pub use config::{Config, GatewayConfig, MeshConfig, PeerSeed, RadarConfig, default_base_dir};
pub use error::{Result, StoreError};
pub use journal::Journal;
