//! Belief-state and planner core for a Reconnaissance Blind Chess agent:
//! a particle-filter belief over true board states (`belief`), a
//! POMCP-style UCB planner (`planner`) that chooses moves against that
//! belief, the underlying RBC-flavored chess model (`board`, `moves`,
//! `piece`, `position`) and the turn-callback glue (`driver`) that ties
//! them together for an outer match loop.

pub mod belief;
pub mod board;
pub mod driver;
pub mod moves;
pub mod piece;
pub mod planner;
pub mod position;
pub mod rng;

/// Build timestamp, stamped by `build.rs`.
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");

/// Install a `tracing` subscriber reading its filter from `RUST_LOG`
/// (defaulting to `info`), for binaries that exercise the agent directly.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
