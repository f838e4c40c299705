/// Fixed text of the SOS broadcast message.
pub const SOS_TEXT: &str = "SOS broadcast activated!";

/// Tokens that flag a chat message as urgent (case-insensitive substring).
pub const URGENCY_TOKENS: [&str; 5] = ["help", "injury", "fire", "rescue", "trapped"];

/// Floor clamp for peer distance. No peer is ever closer than this.
pub const MIN_DISTANCE: f64 = 1.0;

/// Half-width of the per-tick random walk: u ∈ [-MAX_STEP, MAX_STEP).
pub const MAX_STEP: f64 = 1.0;

/// Reference radar cadence in milliseconds.
pub const TICK_PERIOD_MS: u64 = 1000;

/// Seed used when no peers are configured.
pub const DEFAULT_PEERS: [(&str, f64); 3] = [("Node1", 5.0), ("Node2", 12.0), ("Node3", 20.0)];

/// Spring rest length between linked mesh nodes.
pub const LINK_DISTANCE: f64 = 80.0;

/// Many-body strength; negative repels.
pub const CHARGE_STRENGTH: f64 = -200.0;

/// Layout anchor (canvas center of a 400x300 view).
pub const CENTER: (f64, f64) = (200.0, 150.0);

/// Relaxation stops once alpha cools below this.
pub const ALPHA_MIN: f64 = 0.001;

/// Fraction of velocity lost per relaxation step.
pub const VELOCITY_DECAY: f64 = 0.4;

/// Iteration budget for one relaxation run.
pub const MAX_ITERATIONS: usize = 300;

/// Convergence threshold on the largest per-step node displacement.
pub const LAYOUT_EPSILON: f64 = 1e-3;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;
