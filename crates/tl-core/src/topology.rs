//! Force-directed projection of the mesh graph onto a 2-D canvas.
//!
//! Three forces act on every relaxation step: a spring along each edge
//! towards `link_distance`, an inverse-distance charge between every pair of
//! nodes, and a translation that keeps the centroid on `center`. Velocities
//! are damped and the whole system cools via `alpha`, so motion settles into
//! one of possibly several locally stable layouts.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::constants::{
    ALPHA_MIN, CENTER, CHARGE_STRENGTH, LAYOUT_EPSILON, LINK_DISTANCE, MAX_ITERATIONS,
    VELOCITY_DECAY,
};
use crate::error::{CoreError, Result};
use crate::point::Point;

const INITIAL_RADIUS: f64 = 10.0;
/// Charge treats pairs closer than this as if they were this far apart.
const DISTANCE_MIN: f64 = 1.0;
const JIGGLE: f64 = 1e-6;

/// Node set plus undirected edge list, referenced by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopologyGraph {
    nodes: Vec<String>,
    edges: Vec<(String, String)>,
}

impl TopologyGraph {
    /// Validate and build a graph. Rejects duplicate node ids, self-loops,
    /// and edges whose endpoints are not in the node set.
    pub fn new<N, E, S>(nodes: N, edges: E) -> Result<Self>
    where
        N: IntoIterator<Item = S>,
        E: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let nodes: Vec<String> = nodes.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(nodes.len());
        for id in &nodes {
            if !seen.insert(id.as_str()) {
                return Err(CoreError::InvalidGraph(format!("duplicate node '{id}'")));
            }
        }

        let mut checked = Vec::new();
        for (source, target) in edges {
            let (source, target): (String, String) = (source.into(), target.into());
            for end in [&source, &target] {
                if !seen.contains(end.as_str()) {
                    return Err(CoreError::InvalidGraph(format!(
                        "edge {source}-{target} references unknown node '{end}'"
                    )));
                }
            }
            if source == target {
                return Err(CoreError::InvalidGraph(format!("self-loop on '{source}'")));
            }
            checked.push((source, target));
        }

        Ok(Self {
            nodes,
            edges: checked,
        })
    }

    /// Parse `"A-B"` edge specs against `nodes`.
    pub fn parse<S: AsRef<str>>(nodes: &[S], edges: &[S]) -> Result<Self> {
        let mut pairs = Vec::with_capacity(edges.len());
        for spec in edges {
            let spec = spec.as_ref();
            let (a, b) = spec
                .split_once('-')
                .ok_or_else(|| CoreError::InvalidGraph(format!("edge '{spec}' is not A-B")))?;
            pairs.push((a.trim().to_string(), b.trim().to_string()));
        }
        Self::new(
            nodes.iter().map(|n| n.as_ref().trim().to_string()),
            pairs,
        )
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn degree(&self, id: &str) -> usize {
        self.edges
            .iter()
            .filter(|(s, t)| s == id || t == id)
            .count()
    }
}

/// Force and cooling parameters for one relaxation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    pub link_distance: f64,
    pub charge_strength: f64,
    pub center: Point,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
    pub max_iterations: usize,
    pub epsilon: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            link_distance: LINK_DISTANCE,
            charge_strength: CHARGE_STRENGTH,
            center: Point::from(CENTER),
            alpha_min: ALPHA_MIN,
            alpha_decay: alpha_decay_for(ALPHA_MIN, MAX_ITERATIONS),
            velocity_decay: VELOCITY_DECAY,
            max_iterations: MAX_ITERATIONS,
            epsilon: LAYOUT_EPSILON,
        }
    }
}

/// Decay rate that cools alpha from 1 to `alpha_min` in `iterations` steps.
pub fn alpha_decay_for(alpha_min: f64, iterations: usize) -> f64 {
    1.0 - alpha_min.powf(1.0 / iterations.max(1) as f64)
}

/// Node positions after one relaxation step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub iteration: usize,
    pub alpha: f64,
    /// Largest distance any node moved during this step.
    pub max_displacement: f64,
    pub positions: Vec<(String, Point)>,
}

impl LayoutSnapshot {
    pub fn position(&self, id: &str) -> Option<Point> {
        self.positions
            .iter()
            .find(|(n, _)| n == id)
            .map(|(_, p)| *p)
    }

    /// Smallest distance between any two nodes (infinite for < 2 nodes).
    pub fn min_separation(&self) -> f64 {
        let mut min = f64::INFINITY;
        for (i, (_, a)) in self.positions.iter().enumerate() {
            for (_, b) in &self.positions[i + 1..] {
                min = min.min(a.distance(*b));
            }
        }
        min
    }
}

/// Iterative force-directed relaxation over a validated graph.
///
/// Each [`step`](Self::step) (or iterator `next`) advances one tick and
/// yields a snapshot, so callers can animate settling or just
/// [`run`](Self::run) to the end.
pub struct TopologyProjector {
    graph: TopologyGraph,
    params: LayoutParams,
    links: Vec<(usize, usize)>,
    link_strength: Vec<f64>,
    link_bias: Vec<f64>,
    positions: Vec<Point>,
    velocities: Vec<Point>,
    alpha: f64,
    iteration: usize,
    last_displacement: f64,
}

impl TopologyProjector {
    pub fn new(graph: TopologyGraph, params: LayoutParams) -> Self {
        let index: HashMap<&str, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        // Graph validation guarantees every endpoint is indexed.
        let links: Vec<(usize, usize)> = graph
            .edges
            .iter()
            .filter_map(|(s, t)| Some((*index.get(s.as_str())?, *index.get(t.as_str())?)))
            .collect();

        let mut count = vec![0usize; graph.nodes.len()];
        for &(s, t) in &links {
            count[s] += 1;
            count[t] += 1;
        }
        let link_strength = links
            .iter()
            .map(|&(s, t)| 1.0 / count[s].min(count[t]) as f64)
            .collect();
        let link_bias = links
            .iter()
            .map(|&(s, t)| count[s] as f64 / (count[s] + count[t]) as f64)
            .collect();

        let positions = initial_positions(graph.nodes.len(), params.center);
        let velocities = vec![Point::ORIGIN; graph.nodes.len()];

        Self {
            graph,
            params,
            links,
            link_strength,
            link_bias,
            positions,
            velocities,
            alpha: 1.0,
            iteration: 0,
            last_displacement: f64::INFINITY,
        }
    }

    /// Validate `nodes`/`edges` and build a projector with default forces.
    pub fn project<N, E, S>(nodes: N, edges: E) -> Result<Self>
    where
        N: IntoIterator<Item = S>,
        E: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Ok(Self::new(
            TopologyGraph::new(nodes, edges)?,
            LayoutParams::default(),
        ))
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Settled: movement below epsilon, fully cooled, or out of budget.
    pub fn is_converged(&self) -> bool {
        self.graph.nodes.is_empty()
            || self.last_displacement < self.params.epsilon
            || self.alpha < self.params.alpha_min
            || self.iteration >= self.params.max_iterations
    }

    /// Advance one relaxation tick. Returns `None` once converged.
    pub fn step(&mut self) -> Option<LayoutSnapshot> {
        if self.is_converged() {
            return None;
        }

        self.alpha += (0.0 - self.alpha) * self.params.alpha_decay;
        let before = self.positions.clone();

        self.apply_links();
        self.apply_charge();
        self.apply_center();

        let keep = 1.0 - self.params.velocity_decay;
        for (p, v) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
            *v = *v * keep;
            *p += *v;
        }

        self.last_displacement = before
            .iter()
            .zip(&self.positions)
            .map(|(a, b)| a.distance(*b))
            .fold(0.0, f64::max);
        self.iteration += 1;
        Some(self.snapshot())
    }

    /// Relax until converged and return the final layout.
    pub fn run(&mut self) -> LayoutSnapshot {
        while self.step().is_some() {}
        self.snapshot()
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            iteration: self.iteration,
            alpha: self.alpha,
            max_displacement: if self.iteration == 0 {
                0.0
            } else {
                self.last_displacement
            },
            positions: self
                .graph
                .nodes
                .iter()
                .cloned()
                .zip(self.positions.iter().copied())
                .collect(),
        }
    }

    /// Current length of every edge, in edge-list order.
    pub fn edge_lengths(&self) -> Vec<f64> {
        self.links
            .iter()
            .map(|&(s, t)| self.positions[s].distance(self.positions[t]))
            .collect()
    }

    fn apply_links(&mut self) {
        for (k, &(s, t)) in self.links.iter().enumerate() {
            let mut delta = (self.positions[t] + self.velocities[t])
                - (self.positions[s] + self.velocities[s]);
            if delta.x == 0.0 {
                delta.x = jiggle(k);
            }
            if delta.y == 0.0 {
                delta.y = jiggle(k + 1);
            }
            let len = delta.length();
            let pull = (len - self.params.link_distance) / len * self.alpha * self.link_strength[k];
            let delta = delta * pull;
            let bias = self.link_bias[k];
            self.velocities[t] -= delta * bias;
            self.velocities[s] += delta * (1.0 - bias);
        }
    }

    fn apply_charge(&mut self) {
        let n = self.positions.len();
        let min2 = DISTANCE_MIN * DISTANCE_MIN;
        for i in 0..n {
            let mut push = Point::ORIGIN;
            for j in 0..n {
                if i == j {
                    continue;
                }
                let mut d = self.positions[j] - self.positions[i];
                if d.x == 0.0 {
                    d.x = jiggle(i + j);
                }
                if d.y == 0.0 {
                    d.y = jiggle(i * n + j);
                }
                let mut l = d.length_squared();
                if l < min2 {
                    l = (min2 * l).sqrt();
                }
                push += d * (self.params.charge_strength * self.alpha / l);
            }
            self.velocities[i] += push;
        }
    }

    fn apply_center(&mut self) {
        let n = self.positions.len();
        if n == 0 {
            return;
        }
        let mut sum = Point::ORIGIN;
        for p in &self.positions {
            sum += *p;
        }
        let shift = sum * (1.0 / n as f64) - self.params.center;
        for p in &mut self.positions {
            *p -= shift;
        }
    }
}

impl Iterator for TopologyProjector {
    type Item = LayoutSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }
}

/// Phyllotaxis spiral around `center`: deterministic and never coincident.
fn initial_positions(n: usize, center: Point) -> Vec<Point> {
    let angle = std::f64::consts::PI * (3.0 - 5f64.sqrt());
    (0..n)
        .map(|i| {
            let r = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
            let a = i as f64 * angle;
            center + Point::new(r * a.cos(), r * a.sin())
        })
        .collect()
}

/// Tiny deterministic nudge that breaks exact alignment.
fn jiggle(salt: usize) -> f64 {
    if salt % 2 == 0 { JIGGLE } else { -JIGGLE }
}
