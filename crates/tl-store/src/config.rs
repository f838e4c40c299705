//! Runtime configuration, read from `config.toml` in the data directory.
//!
//! Every field has a default, so a missing file or a partial file yields the
//! reference setup: gateway on localhost:5000, three seeded radar peers and
//! the A-B-C-D mesh chain.

use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::{Deserialize, Serialize};

use tl_core::constants::{ALPHA_MIN, DEFAULT_PEERS, LAYOUT_EPSILON, MAX_ITERATIONS, VELOCITY_DECAY};
use tl_core::topology::alpha_decay_for;
use tl_core::{
    CENTER, CHARGE_STRENGTH, LINK_DISTANCE, LayoutParams, Point, ProximityEstimator,
    TICK_PERIOD_MS, TopologyGraph,
};

use crate::error::{Result, StoreError};

pub const CONFIG_FILE: &str = "config.toml";
pub const JOURNAL_FILE: &str = "messages.db";

pub const DATA_DIR_ENV: &str = "TL_DATA_DIR";
pub const API_URL_ENV: &str = "TL_API_URL";

/// Base directory for config and journal: `$TL_DATA_DIR`, else `~/.terralink`.
pub fn default_base_dir() -> PathBuf {
    if let Ok(dir) = env::var(DATA_DIR_ENV)
        && !dir.is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs_home().join(".terralink")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub radar: RadarConfig,
    pub mesh: MeshConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            connect_timeout_ms: 3_000,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerSeed {
    pub id: String,
    pub distance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub tick_ms: u64,
    pub peers: Vec<PeerSeed>,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            tick_ms: TICK_PERIOD_MS,
            peers: DEFAULT_PEERS
                .iter()
                .map(|(id, distance)| PeerSeed {
                    id: id.to_string(),
                    distance: *distance,
                })
                .collect(),
        }
    }
}

impl RadarConfig {
    pub fn estimator(&self) -> Result<ProximityEstimator> {
        Ok(ProximityEstimator::new(
            self.peers.iter().map(|p| (p.id.clone(), p.distance)),
        )?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub nodes: Vec<String>,
    /// `"A-B"` pairs.
    pub edges: Vec<String>,
    pub link_distance: f64,
    pub charge_strength: f64,
    pub center: [f64; 2],
    pub max_iterations: usize,
    pub epsilon: f64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            nodes: ["A", "B", "C", "D"].map(String::from).to_vec(),
            edges: ["A-B", "B-C", "C-D"].map(String::from).to_vec(),
            link_distance: LINK_DISTANCE,
            charge_strength: CHARGE_STRENGTH,
            center: [CENTER.0, CENTER.1],
            max_iterations: MAX_ITERATIONS,
            epsilon: LAYOUT_EPSILON,
        }
    }
}

impl MeshConfig {
    pub fn graph(&self) -> Result<TopologyGraph> {
        Ok(TopologyGraph::parse(&self.nodes, &self.edges)?)
    }

    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            link_distance: self.link_distance,
            charge_strength: self.charge_strength,
            center: Point::new(self.center[0], self.center[1]),
            alpha_min: ALPHA_MIN,
            alpha_decay: alpha_decay_for(ALPHA_MIN, self.max_iterations),
            velocity_decay: VELOCITY_DECAY,
            max_iterations: self.max_iterations,
            epsilon: self.epsilon,
        }
    }
}

impl Config {
    /// Read `path` if it exists, otherwise start from defaults. `TL_API_URL`
    /// overrides the gateway base URL either way.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)?;
            Self::from_toml(&raw)
                .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Self::default()
        };
        if let Ok(url) = env::var(API_URL_ENV)
            && !url.is_empty()
        {
            config.gateway.base_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Config from `<base_dir>/config.toml`.
    pub fn load_from_dir(base_dir: &Path) -> Result<Self> {
        Self::load(&base_dir.join(CONFIG_FILE))
    }

    pub fn from_toml(raw: &str) -> std::result::Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.radar.tick_ms == 0 {
            return Err(StoreError::Config("radar.tick_ms must be positive".into()));
        }
        if self.gateway.base_url.trim().is_empty() {
            return Err(StoreError::Config("gateway.base_url is empty".into()));
        }
        if !self.mesh.center.iter().all(|c| c.is_finite()) {
            return Err(StoreError::Config("mesh.center must be finite".into()));
        }
        Ok(())
    }
}
