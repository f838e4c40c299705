use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PEERS, MAX_STEP, MIN_DISTANCE};
use crate::error::{CoreError, Result};

/// A simulated mesh neighbour. Smaller distance means closer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub id: String,
    pub distance: f64,
}

/// Immutable view of every peer's distance after a given tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProximitySnapshot {
    /// Number of ticks applied so far; 0 is the seed.
    pub tick: u64,
    pub peers: Vec<Peer>,
}

impl ProximitySnapshot {
    pub fn distance(&self, id: &str) -> Option<f64> {
        self.peers.iter().find(|p| p.id == id).map(|p| p.distance)
    }

    pub fn nearest(&self) -> Option<&Peer> {
        self.peers
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// One random-walk step: `max(MIN_DISTANCE, distance + u)`.
pub fn step(distance: f64, u: f64) -> f64 {
    (distance + u).max(MIN_DISTANCE)
}

/// Owns the peer → distance mapping. The peer set is fixed at construction;
/// each tick perturbs every distance independently.
#[derive(Clone, Debug)]
pub struct ProximityEstimator {
    peers: Vec<Peer>,
    ticks: u64,
}

impl ProximityEstimator {
    /// Seed from `(id, distance)` pairs, keeping their order. Seed distances
    /// below the floor are clamped up to it; duplicate ids and non-finite
    /// distances are rejected.
    pub fn new<I, S>(seed: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut peers: Vec<Peer> = Vec::new();
        for (id, distance) in seed {
            let id = id.into();
            if !distance.is_finite() {
                return Err(CoreError::InvalidDistance {
                    id,
                    value: distance,
                });
            }
            if peers.iter().any(|p| p.id == id) {
                return Err(CoreError::DuplicatePeer(id));
            }
            peers.push(Peer {
                id,
                distance: distance.max(MIN_DISTANCE),
            });
        }
        Ok(Self { peers, ticks: 0 })
    }

    /// The reference three-node seed.
    pub fn with_default_peers() -> Self {
        Self {
            peers: DEFAULT_PEERS
                .iter()
                .map(|(id, d)| Peer {
                    id: id.to_string(),
                    distance: *d,
                })
                .collect(),
            ticks: 0,
        }
    }

    /// Advance one tick, drawing one `u ∈ [-1, 1)` per peer from `rng`.
    pub fn tick(&mut self, rng: &mut impl Rng) -> ProximitySnapshot {
        for peer in &mut self.peers {
            let u: f64 = rng.random_range(-MAX_STEP..MAX_STEP);
            peer.distance = step(peer.distance, u);
        }
        self.ticks += 1;
        self.snapshot()
    }

    pub fn snapshot(&self) -> ProximitySnapshot {
        ProximitySnapshot {
            tick: self.ticks,
            peers: self.peers.clone(),
        }
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn distance(&self, id: &str) -> Option<f64> {
        self.peers.iter().find(|p| p.id == id).map(|p| p.distance)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
