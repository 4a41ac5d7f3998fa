//! The POMCP-style planner: a UCB tree alternating our moves and the
//! opponent's (unobserved) replies, rooted at a subsampled belief.
//!
//! Unlike a normal-information MCTS, each node owns a *distribution* over
//! boards rather than a single board, and the opponent's branch is
//! literally simulated with a random move rather than searched, since we
//! never observe what the opponent actually played.

use crate::belief::StateDistribution;
use crate::moves::Move;
use crate::piece::{Color, PieceType};
use crate::rng::BeliefRng;

/// Tunables for one `choose_move` call, grouped into a single config
/// struct.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    /// UCB exploration constant `c` in `value + c * sqrt(ln(N) / n)`.
    pub ucb_constant: f64,
    /// Seconds the agent is given for an entire game; used to scale
    /// iteration count and rollout depth down as the clock runs low.
    pub total_budget_secs: f64,
    /// Iteration count at the start of the game (full budget remaining).
    pub base_iterations: usize,
    /// Rollout depth at the start of the game.
    pub base_rollout_depth: i32,
    /// Particles subsampled from the belief for one `choose_move` call.
    pub rollout_particles: usize,
    /// Particles sampled per leaf-heuristic evaluation.
    pub heuristic_samples: usize,
    /// Independent root-parallel trees to search concurrently. `1` means
    /// sequential, matching the reference design's single-threaded model.
    pub worker_threads: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            ucb_constant: 1.0,
            total_budget_secs: 600.0,
            base_iterations: 1000,
            base_rollout_depth: 5,
            rollout_particles: crate::belief::N_ROLLOUT_PARTICLES,
            heuristic_samples: 10,
            worker_threads: 1,
        }
    }
}

impl PlannerConfig {
    /// `f = (total_budget - seconds_left) / total_budget`, clamped to
    /// `[0, 1]`; iteration count and rollout depth both scale by `1 - f^2`.
    fn budget_fraction(&self, seconds_left: f64) -> f64 {
        let f = (self.total_budget_secs - seconds_left) / self.total_budget_secs;
        f.clamp(0.0, 1.0)
    }

    pub fn iterations_for(&self, seconds_left: f64) -> usize {
        let f = self.budget_fraction(seconds_left);
        ((self.base_iterations as f64) * (1.0 - f * f)).round().max(1.0) as usize
    }

    pub fn rollout_depth_for(&self, seconds_left: f64) -> i32 {
        let f = self.budget_fraction(seconds_left);
        ((self.base_rollout_depth as f64) * (1.0 - f * f)).round().max(0.0) as i32
    }
}

/// A win this far along (king already captured in the resulting
/// distribution) is treated as decisive and the rollout stops recursing.
const DECISIVE_REWARD: f64 = 1.0 - 1e-10;
/// Discount applied to the rolled-out continuation reward.
const DISCOUNT: f64 = 0.95;
/// Magnitude of the UCB tie-break jitter added to each entry's initial
/// value, per spec: preserved for deterministic argmax modulo RNG seed.
const TIE_BREAK_EPSILON: f64 = 1e-200;

/// A belief-state node where it is our turn to choose among pseudo-legal
/// moves. Corresponds to `T(ha)` in the POMCP literature.
pub struct OurNode {
    our_color: Color,
    entries: Vec<Entry>,
    count: u32,
}

/// One edge out of an `OurNode`: a single move we could play, plus the
/// (possibly several) opponent-node children it leads to — one per
/// equivalence class of *our own* move's actual outcome (since a slide or
/// castle can land short or be wasted on some particles and not others).
struct Entry {
    our_move: Move,
    our_color: Color,
    reward: f64,
    value: f64,
    count: u32,
    children: Vec<MoveChild>,
}

struct MoveChild {
    weight: f64,
    prior: StateDistribution,
    node: Option<OpponentNode>,
}

/// A belief-state node after our move but before the opponent's (hidden)
/// reply has been revealed to us.
pub struct OpponentNode {
    reward: f64,
    value: f64,
    count: u32,
    children: Vec<(f64, OurNode)>,
}

impl OurNode {
    /// Build a fresh tree root (or child) from a prior belief: one `Entry`
    /// per available action, enumerated from particle 0 since every
    /// particle agrees on our own pieces.
    pub fn new(
        state: StateDistribution,
        our_color: Color,
        config: &PlannerConfig,
        rng: &mut BeliefRng,
    ) -> Self {
        let actions = state.available_actions(our_color);
        let mut entries = Vec::with_capacity(actions.len());
        let mut count = 0u32;
        for mv in actions {
            let entry = Entry::new(&state, mv, our_color, config, rng);
            count += entry.count;
            entries.push(entry);
        }
        OurNode {
            our_color,
            entries,
            count,
        }
    }

    fn ucb(value: f64, n: u32, total: u32, c: f64) -> f64 {
        if n == 0 {
            return f64::INFINITY;
        }
        value + c * ((total.max(1) as f64).ln() / f64::from(n)).sqrt()
    }

    /// Index of the entry with the largest UCB score, ties broken by
    /// whichever entry was enumerated first (stable `max_by` semantics
    /// combined with the construction-time jitter keep this deterministic
    /// for a fixed seed).
    fn best_ucb_index(&self, ucb_constant: f64) -> usize {
        let mut best_idx = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, entry) in self.entries.iter().enumerate() {
            let score = Self::ucb(entry.value, entry.count, self.count, ucb_constant);
            if score > best_score {
                best_score = score;
                best_idx = i;
            }
        }
        best_idx
    }

    /// One POMCP rollout: descend by UCB, recurse through a randomly
    /// sampled opponent child, and back up the discounted reward.
    pub fn simulate(&mut self, depth: i32, config: &PlannerConfig, rng: &mut BeliefRng) -> f64 {
        if depth < 0 || self.entries.is_empty() {
            return 0.0;
        }
        let idx = self.best_ucb_index(config.ucb_constant);
        let reward = self.entries[idx].simulate(depth, config, rng);
        self.count += 1;
        reward
    }

    /// The entry with the best *value* (not UCB) — the move `choose_move`
    /// actually plays once the iteration budget is spent.
    pub fn best_entry_move(&self) -> Option<(Move, f64)> {
        self.entries
            .iter()
            .max_by(|a, b| a.value.partial_cmp(&b.value).expect("values are never NaN"))
            .map(|entry| (entry.our_move, entry.value))
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl Entry {
    fn new(
        state_prior: &StateDistribution,
        our_move: Move,
        our_color: Color,
        config: &PlannerConfig,
        rng: &mut BeliefRng,
    ) -> Self {
        let (groups, win_fraction) = state_prior.update(our_move, rng);
        let mut reward = win_fraction;
        let mut count = 0u32;
        if reward < DECISIVE_REWARD {
            let h = weighted_heuristic(&groups, our_color, config, rng);
            reward += h * (1.0 - reward);
            count = 2;
        }
        let children = groups
            .into_iter()
            .map(|(_, dist)| MoveChild {
                weight: dist.len() as f64,
                prior: dist,
                node: None,
            })
            .collect();
        let value = reward + rng.gen_range_f64(-TIE_BREAK_EPSILON, TIE_BREAK_EPSILON);
        Entry {
            our_move,
            our_color,
            reward,
            value,
            count,
            children,
        }
    }

    fn simulate(&mut self, depth: i32, config: &PlannerConfig, rng: &mut BeliefRng) -> f64 {
        let mut total = self.reward;
        if self.reward < DECISIVE_REWARD && !self.children.is_empty() {
            let child_idx = weighted_choice(&self.children, |c| c.weight, rng);
            let child = &mut self.children[child_idx];
            let node = child
                .node
                .get_or_insert_with(|| OpponentNode::new(&child.prior, self.our_color, config, rng));
            let sim = node.simulate(depth, config, rng);
            total += DISCOUNT * (1.0 - self.reward) * sim;
        }
        self.count += 1;
        self.value += (total - self.value) / f64::from(self.count);
        total
    }
}

impl OpponentNode {
    fn new(
        prior: &StateDistribution,
        our_color: Color,
        config: &PlannerConfig,
        rng: &mut BeliefRng,
    ) -> Self {
        let opponent_color = our_color.opponent();
        let groups = prior.update_random(opponent_color, rng);
        let mut total_count = 0usize;
        let mut reward = 0.0;
        let mut children = Vec::new();
        for (count, capture, dist) in groups {
            total_count += count;
            if capture.piece.piece_type == PieceType::King {
                reward -= count as f64;
            } else {
                let our_node = OurNode::new(dist, our_color, config, rng);
                children.push((count as f64, our_node));
            }
        }
        let reward = reward / total_count.max(1) as f64;
        OpponentNode {
            reward,
            value: reward,
            count: 0,
            children,
        }
    }

    fn simulate(&mut self, depth: i32, config: &PlannerConfig, rng: &mut BeliefRng) -> f64 {
        if self.children.is_empty() || depth < 0 {
            return self.reward;
        }
        let idx = weighted_choice(&self.children, |(weight, _)| *weight, rng);
        let result = {
            let (_, child) = &mut self.children[idx];
            self.reward + (1.0 + self.reward) * child.simulate(depth - 1, config, rng)
        };
        self.count += 1;
        self.value += (result - self.value) / f64::from(self.count);
        result
    }
}

/// Particle-count-weighted average of the leaf heuristic across the
/// post-move equivalence classes produced by `Entry::new`.
fn weighted_heuristic(
    groups: &[(Move, StateDistribution)],
    our_color: Color,
    config: &PlannerConfig,
    rng: &mut BeliefRng,
) -> f64 {
    let total: usize = groups.iter().map(|(_, dist)| dist.len()).sum();
    if total == 0 {
        return 0.0;
    }
    groups
        .iter()
        .map(|(_, dist)| {
            dist.heuristic_value(our_color, rng, config.heuristic_samples) * dist.len() as f64
        })
        .sum::<f64>()
        / total as f64
}

/// Pick an index from `items` with probability proportional to `weight`.
fn weighted_choice<T>(items: &[T], weight: impl Fn(&T) -> f64, rng: &mut BeliefRng) -> usize {
    let total: f64 = items.iter().map(&weight).sum();
    if total <= 0.0 {
        return rng.gen_range(0, items.len());
    }
    let mut target = rng.gen_range_f64(0.0, total);
    for (i, item) in items.iter().enumerate() {
        target -= weight(item);
        if target <= 0.0 {
            return i;
        }
    }
    items.len() - 1
}

/// The chosen move, the number of iterations actually run, and the winning
/// entry's value.
pub struct ChooseMoveResult {
    pub mv: Move,
    pub iterations: usize,
    pub value: f64,
}

/// Build a root `OurNode` from `belief` and run `iterations` rollouts of
/// `depth`, returning the best move by value. Single-threaded; see
/// `choose_move_parallel` for the root-parallel variant.
pub fn choose_move(
    belief: &StateDistribution,
    our_color: Color,
    config: &PlannerConfig,
    seconds_left: f64,
    rng: &mut BeliefRng,
) -> ChooseMoveResult {
    let subsampled = belief.subsample(config.rollout_particles, rng);
    let mut root = OurNode::new(subsampled, our_color, config, rng);
    let iterations = config.iterations_for(seconds_left);
    let depth = config.rollout_depth_for(seconds_left);
    for _ in 0..iterations {
        root.simulate(depth, config, rng);
    }
    let (mv, value) = root
        .best_entry_move()
        .expect("our own color always has at least one pseudo-legal move available");
    ChooseMoveResult {
        mv,
        iterations,
        value,
    }
}

/// Root-parallel variant: build `config.worker_threads` independent trees
/// from independent particle subsamples and independent RNG streams, run
/// each to `iterations` in its own thread, then merge by summing each
/// tree's winning entry's (count, value) into a single weighted average —
/// the "embarrassingly parallel per independent simulation" opportunity
/// spec.md §5 describes, expressed as independent trees rather than a
/// shared tree behind a lock (see DESIGN.md for why).
pub fn choose_move_parallel(
    belief: &StateDistribution,
    our_color: Color,
    config: &PlannerConfig,
    seconds_left: f64,
    rng: &mut BeliefRng,
) -> ChooseMoveResult {
    if config.worker_threads <= 1 {
        return choose_move(belief, our_color, config, seconds_left, rng);
    }
    let seeds: Vec<u64> = (0..config.worker_threads).map(|_| rng.gen_range(0, u32::MAX as usize) as u64).collect();
    let results: Vec<ChooseMoveResult> = std::thread::scope(|scope| {
        let handles: Vec<_> = seeds
            .into_iter()
            .map(|seed| {
                scope.spawn(move || {
                    let mut worker_rng = BeliefRng::from_seed(seed);
                    choose_move(belief, our_color, config, seconds_left, &mut worker_rng)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("planner worker thread panicked"))
            .collect()
    });
    // Vote by weighted value across workers; the move with the highest
    // average value (weighted by iteration count) wins.
    let mut totals: std::collections::HashMap<Move, (f64, usize)> = std::collections::HashMap::new();
    let mut total_iterations = 0usize;
    for r in &results {
        total_iterations += r.iterations;
        let entry = totals.entry(r.mv).or_insert((0.0, 0));
        entry.0 += r.value * r.iterations as f64;
        entry.1 += r.iterations;
    }
    let (mv, (weighted_value, weight)) = totals
        .into_iter()
        .max_by(|a, b| {
            let va = a.1 .0 / a.1 .1.max(1) as f64;
            let vb = b.1 .0 / b.1 .1.max(1) as f64;
            va.partial_cmp(&vb).expect("values are never NaN")
        })
        .expect("at least one worker produced a result");
    ChooseMoveResult {
        mv,
        iterations: total_iterations,
        value: weighted_value / weight.max(1) as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::piece::{Piece, PieceType};
    use crate::position::Position;

    fn config() -> PlannerConfig {
        PlannerConfig {
            rollout_particles: 8,
            heuristic_samples: 3,
            ..PlannerConfig::default()
        }
    }

    #[test]
    fn our_node_entries_only_move_our_own_pieces() {
        let board = Board::initial();
        let belief = StateDistribution::reinitialize(board.clone(), 8);
        let mut rng = BeliefRng::from_seed(3);
        let node = OurNode::new(belief, Color::White, &config(), &mut rng);
        assert!(node.entry_count() > 0);
        let (mv, _) = node.best_entry_move().unwrap();
        assert_eq!(board.get(mv.from).color, Color::White);
    }

    #[test]
    fn queen_captures_king_when_every_particle_agrees() {
        let mut board = Board::empty();
        board.set(Position::new(0, 0), Piece::new(Color::White, PieceType::Queen));
        board.set(Position::new(7, 0), Piece::new(Color::Black, PieceType::King));
        board.set(Position::new(0, 4), Piece::new(Color::White, PieceType::King));
        let belief = StateDistribution::reinitialize(board, 8);
        let mut rng = BeliefRng::from_seed(1);
        let mut cfg = config();
        cfg.base_iterations = 200;
        cfg.base_rollout_depth = 3;
        let result = choose_move(&belief, Color::White, &cfg, cfg.total_budget_secs, &mut rng);
        assert_eq!(result.mv, Move::new(Position::new(0, 0), Position::new(7, 0)));
    }

    #[test]
    fn budget_scaling_shrinks_iterations_and_depth_as_clock_runs_down() {
        let cfg = PlannerConfig::default();
        assert_eq!(cfg.iterations_for(cfg.total_budget_secs), cfg.base_iterations);
        assert!(cfg.iterations_for(0.0) < cfg.base_iterations);
        assert!(cfg.rollout_depth_for(0.0) < cfg.base_rollout_depth);
    }
}
