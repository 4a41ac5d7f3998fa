//! The particle-filter belief over the true board state.
//!
//! Each particle is a full `Board` consistent with everything we've
//! observed so far. Every particle agrees on our own pieces exactly (we
//! always know where our own pieces are); they can disagree about where the
//! opponent's pieces are. Operations here repair particles against new
//! evidence (sensing, move results, observed captures) by "coercing" the
//! disagreeing squares rather than discarding and rebuilding the whole
//! particle, since a full rebuild would throw away everything else the
//! particle got right.

use crate::board::Board;
use crate::moves::{Capture, Move, Observation};
use crate::piece::{Color, Piece, PieceType};
use crate::position::Position;
use crate::rng::BeliefRng;
use anyhow::{bail, Result};
use std::collections::HashMap;

/// Total particle count the filter tries to maintain.
pub const N_PARTICLES: usize = 1_000_000;
/// Particles actually handed to the planner for one rollout.
pub const N_ROLLOUT_PARTICLES: usize = 100;

const PIECE_TYPES: [PieceType; 6] = [
    PieceType::Pawn,
    PieceType::Queen,
    PieceType::King,
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
];

#[derive(Debug, Clone)]
pub struct StateDistribution {
    particles: Vec<Board>,
}

impl StateDistribution {
    pub fn reinitialize(board: Board, count: usize) -> Self {
        StateDistribution {
            particles: vec![board; count],
        }
    }

    /// Build a distribution directly from an explicit particle list —
    /// mainly useful for constructing mixed-hypothesis beliefs in tests.
    pub fn from_particles(particles: Vec<Board>) -> Self {
        StateDistribution { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Board] {
        &self.particles
    }

    pub fn sample<'a>(&'a self, rng: &mut BeliefRng) -> &'a Board {
        rng.choose(&self.particles).expect("belief has no particles")
    }

    /// Every particle must agree with particle 0 on every square occupied
    /// by `our_color`. Checked after every repair operation in debug
    /// builds, and callable directly for integration tests.
    pub fn check_valid(&self, our_color: Color) -> bool {
        let Some(reference) = self.particles.first() else {
            return true;
        };
        self.particles.iter().all(|board| {
            (0..8).all(|rank| {
                (0..8).all(|file| {
                    let pos = Position::new(rank, file);
                    let ref_piece = reference.get(pos);
                    if ref_piece.color != our_color {
                        return true;
                    }
                    board.get(pos) == ref_piece
                })
            })
        })
    }

    fn debug_check_valid(&self, our_color: Color) {
        debug_assert!(
            self.check_valid(our_color),
            "own-piece invariant violated across particles"
        );
    }

    /// Subsample `count` particles (with replacement) into a fresh
    /// distribution — used before handing the belief to the planner.
    pub fn subsample(&self, count: usize, rng: &mut BeliefRng) -> StateDistribution {
        let particles = (0..count)
            .map(|_| self.sample(rng).clone())
            .collect();
        StateDistribution { particles }
    }

    /// Per-square Shannon entropy (in bits) of the opponent's piece
    /// identity, over the whole board.
    pub fn entropy(&self, opponent: Color) -> [[f64; 8]; 8] {
        let mut out = [[0.0; 8]; 8];
        for rank in 0..8usize {
            for file in 0..8usize {
                out[rank][file] = self.square_entropy(Position::new(rank as i8, file as i8), opponent);
            }
        }
        out
    }

    /// Entropy of the opponent's piece identity at a single square.
    pub fn square_entropy(&self, pos: Position, opponent: Color) -> f64 {
        let mut counts: HashMap<Piece, usize> = HashMap::new();
        let mut total = 0usize;
        for board in &self.particles {
            let piece = board.get(pos);
            if piece.color == opponent || piece.is_empty() {
                *counts.entry(piece).or_insert(0) += 1;
                total += 1;
            }
        }
        if total == 0 {
            return 0.0;
        }
        -counts
            .values()
            .map(|&count| {
                let p = count as f64 / total as f64;
                p * p.log2()
            })
            .sum::<f64>()
    }

    pub fn reinitialize_in_place(&mut self, board: Board, count: usize) {
        self.particles = vec![board; count];
    }

    /// All pseudo-legal moves available to `color`. All particles agree on
    /// our own pieces, so particle 0 alone determines our own available
    /// actions.
    pub fn available_actions(&self, color: Color) -> Vec<Move> {
        self.particles[0].generate_moves(color)
    }

    /// Repair every particle against a fresh sense observation. A particle
    /// that cannot be coerced into matching the observation is resampled
    /// from the surviving, now-consistent particles until the original
    /// particle count is restored.
    pub fn observe(&mut self, obs: &Observation, our_color: Color, rng: &mut BeliefRng) -> Result<()> {
        let target = self.particles.len();
        if target == 0 {
            bail!("cannot observe into an empty belief");
        }
        let mut repaired = Vec::with_capacity(target);
        let mut attempts = 0usize;
        let max_attempts = target.saturating_mul(50).max(1000);
        while repaired.len() < target {
            attempts += 1;
            if attempts > max_attempts {
                bail!("belief degenerate: no particle could be coerced to match the observation");
            }
            let idx = attempts % self.particles.len();
            let mut candidate = self.particles[idx].clone();
            if coerce_board(&mut candidate, obs, our_color, rng) && is_consistent(&candidate, obs, our_color) {
                repaired.push(candidate);
            }
        }
        self.particles = repaired;
        self.debug_check_valid(our_color);
        Ok(())
    }

    /// Apply `taken_move` (the move we actually attempted) to every
    /// particle, reconciling each particle's belief about the target
    /// square first so the replay is consistent with what the game server
    /// reported actually happened.
    /// `captured`/`capture_square` mirror the external interface exactly
    /// (spec.md §6): the driver tells us *that* and *where* a capture
    /// happened, never the captured piece's identity, since different
    /// particles may legitimately disagree about what was actually there.
    pub fn handle_move_result(
        &mut self,
        taken_move: Move,
        captured: bool,
        capture_square: Position,
        our_color: Color,
        rng: &mut BeliefRng,
    ) -> Result<()> {
        self.debug_check_valid(our_color);
        if taken_move.is_wasted() {
            // Nothing to reconcile: the move never touched the board.
            return Ok(());
        }
        let target = self.particles.len();
        let mut repaired = Vec::with_capacity(target);
        let mut attempts = 0usize;
        let max_attempts = target.saturating_mul(50).max(1000);
        while repaired.len() < target {
            attempts += 1;
            if attempts > max_attempts {
                bail!("belief degenerate: no particle reproduced the reported move result");
            }
            let idx = attempts % self.particles.len();
            let mut candidate = self.particles[idx].clone();
            if captured && candidate.get(capture_square).is_empty() {
                // The particle thinks the captured square was empty; teleport
                // a same-typed-or-arbitrary enemy piece there before replay.
                let _ = relocate_missing_enemy_piece(&mut candidate, capture_square, rng);
            } else if !captured {
                // No capture reported: whatever the particle thinks sits on
                // the destination square must be moved out of the way first.
                displace_board_piece(&mut candidate, taken_move.to, rng);
            }
            let result = candidate.apply_move(taken_move);
            if result.mv.to == taken_move.to {
                repaired.push(candidate);
            }
        }
        self.particles = repaired;
        self.debug_check_valid(our_color);
        Ok(())
    }

    /// Apply the opponent's (unobserved) move to every particle via
    /// `Board::do_random_move`, keeping only particles whose random replay
    /// is consistent with whether and where a capture was reported.
    pub fn handle_opponent_move_result(
        &mut self,
        capture_reported: bool,
        capture_square: Position,
        opponent_color: Color,
        rng: &mut BeliefRng,
    ) -> Result<()> {
        self.debug_check_valid(opponent_color.opponent());
        let target = self.particles.len();
        let mut repaired = Vec::with_capacity(target);
        let mut attempts = 0usize;
        let max_attempts = target.saturating_mul(50).max(1000);
        while repaired.len() < target {
            attempts += 1;
            if attempts > max_attempts {
                bail!("belief degenerate: no particle reproduced the opponent's reported capture");
            }
            let idx = attempts % self.particles.len();
            let mut candidate = self.particles[idx].clone();
            let result = candidate.do_random_move(opponent_color, rng);
            let matches = if capture_reported {
                !result.capture.is_none() && result.capture.position == capture_square
            } else {
                result.capture.is_none()
            };
            if matches {
                repaired.push(candidate);
            }
        }
        self.particles = repaired;
        self.debug_check_valid(opponent_color.opponent());
        Ok(())
    }

    /// Apply `our_move` to every particle, grouping the results by the move
    /// actually played (which can differ across particles — a castle that's
    /// legal on one particle may be blocked on another). Returns the
    /// groups (each a full-size upsampled `StateDistribution`) plus the
    /// fraction of particles that resulted in a king capture (a win).
    pub fn update(&self, our_move: Move, rng: &mut BeliefRng) -> (Vec<(Move, StateDistribution)>, f64) {
        let original_count = self.particles.len();
        let mut groups: HashMap<Move, Vec<Board>> = HashMap::new();
        let mut wins = 0usize;
        for board in &self.particles {
            let mut candidate = board.clone();
            let result = candidate.apply_move(our_move);
            if result.capture.piece.piece_type == PieceType::King {
                wins += 1;
                continue;
            }
            groups.entry(result.mv).or_default().push(candidate);
        }
        let win_fraction = wins as f64 / original_count.max(1) as f64;
        let mut out = Vec::with_capacity(groups.len());
        for (mv, boards) in groups {
            let upsampled = upsample(boards, original_count, rng);
            out.push((mv, StateDistribution { particles: upsampled }));
        }
        (out, win_fraction)
    }

    /// Like `update`, but for the opponent's hidden move: every particle
    /// plays a random move for `opponent_color`, grouped by the resulting
    /// `Capture` rather than by the move itself (since we never observe the
    /// move, only whether and where something was captured).
    pub fn update_random(&self, opponent_color: Color, rng: &mut BeliefRng) -> Vec<(usize, Capture, StateDistribution)> {
        let original_count = self.particles.len();
        let mut groups: HashMap<Capture, Vec<Board>> = HashMap::new();
        for board in &self.particles {
            let mut candidate = board.clone();
            let result = candidate.do_random_move(opponent_color, rng);
            groups.entry(result.capture).or_default().push(candidate);
        }
        groups
            .into_iter()
            .map(|(capture, boards)| {
                let count = boards.len();
                let upsampled = upsample(boards, original_count, rng);
                (count, capture, StateDistribution { particles: upsampled })
            })
            .collect()
    }

    /// Material + advancement heuristic over a handful of sampled
    /// particles, used as a leaf value in the planner when a rollout
    /// hasn't reached a decisive outcome.
    pub fn heuristic_value(&self, our_color: Color, rng: &mut BeliefRng, samples: usize) -> f64 {
        let mut total = 0.0;
        let draws = samples.max(1);
        for _ in 0..draws {
            let board = self.sample(rng);
            for rank in 0..8 {
                for file in 0..8 {
                    let piece = board.get(Position::new(rank, file));
                    if piece.is_empty() {
                        continue;
                    }
                    let value = piece_value(piece.piece_type) + mirrored_rank(piece.color, rank);
                    let sign = if piece.color == our_color {
                        1.0
                    } else if piece.color == our_color.opponent() {
                        -1.0
                    } else {
                        0.0
                    };
                    total += value * sign;
                }
            }
        }
        total / draws as f64 / HEURISTIC_NORMALIZER
    }
}

/// Carried unchanged from the reference implementation: an empirically
/// chosen normalizer, not a derived constant.
const HEURISTIC_NORMALIZER: f64 = 188.0;

fn piece_value(pt: PieceType) -> f64 {
    match pt {
        PieceType::Pawn => 1.0,
        PieceType::Knight | PieceType::Bishop | PieceType::Rook => 10.0,
        PieceType::Queen => 20.0,
        PieceType::King => 100.0,
        PieceType::Empty => 0.0,
    }
}

/// Advancement bonus for a piece on rank `rank`, mirrored so both colors
/// are rewarded for pushing toward the opponent's back rank.
fn mirrored_rank(color: Color, rank: usize) -> f64 {
    match color {
        Color::Black => (7 - rank) as f64,
        _ => rank as f64,
    }
}

/// Resample `boards` back up to `target` particles (with replacement),
/// preserving every original board.
fn upsample(boards: Vec<Board>, target: usize, rng: &mut BeliefRng) -> Vec<Board> {
    if boards.is_empty() {
        return boards;
    }
    let mut out = Vec::with_capacity(target);
    while out.len() < target {
        let idx = rng.gen_range(0, boards.len());
        out.push(boards[idx].clone());
    }
    out
}

/// Repair `board`'s enemy-held squares against the 3x3 `obs` window.
/// Returns `false` if a square belonging to us disagrees with the
/// observation (a contradiction the particle cannot recover from).
fn coerce_board(board: &mut Board, obs: &Observation, our_color: Color, rng: &mut BeliefRng) -> bool {
    for dr in 0..3usize {
        for df in 0..3usize {
            let pos = obs.absolute(dr, df);
            if !pos.in_bounds() {
                continue;
            }
            let obs_piece = obs.piece_at(dr, df);
            let board_piece = board.get(pos);
            if obs_piece.color == our_color || board_piece.color == our_color {
                if obs_piece != board_piece {
                    return false;
                }
                continue;
            }
            if obs_piece == board_piece {
                continue;
            }
            match (obs_piece.is_empty(), board_piece.is_empty()) {
                (false, true) => {
                    // Observation shows an enemy piece the board doesn't have:
                    // pull a matching piece in from somewhere else on the board.
                    if !pull_obs_piece_onto_board(board, obs, dr, df, pos, rng) {
                        return false;
                    }
                }
                (false, false) => {
                    // Both occupied but disagree: displace what's here, then
                    // pull the observed piece in.
                    displace_board_piece(board, pos, rng);
                    if !pull_obs_piece_onto_board(board, obs, dr, df, pos, rng) {
                        return false;
                    }
                }
                (true, false) => {
                    // Observation shows empty but board has a piece there:
                    // relocate it elsewhere.
                    displace_board_piece(board, pos, rng);
                }
                (true, true) => {}
            }
        }
    }
    true
}

fn is_consistent(board: &Board, obs: &Observation, our_color: Color) -> bool {
    for dr in 0..3usize {
        for df in 0..3usize {
            let pos = obs.absolute(dr, df);
            if !pos.in_bounds() {
                continue;
            }
            let _ = our_color;
            if board.get(pos) != obs.piece_at(dr, df) {
                return false;
            }
        }
    }
    true
}

/// Move whatever sits at `pos` to a plausible elsewhere-square: for a
/// bishop, a same-square-color empty square (bishops never change square
/// color); for anything else, any empty square.
fn displace_board_piece(board: &mut Board, pos: Position, rng: &mut BeliefRng) {
    let piece = board.get(pos);
    if piece.is_empty() {
        return;
    }
    let empties: Vec<Position> = all_positions()
        .into_iter()
        .filter(|&p| p != pos && board.get(p).is_empty())
        .collect();
    if empties.is_empty() {
        return;
    }
    let candidates: Vec<Position> = if piece.piece_type == PieceType::Bishop {
        let same_color: Vec<Position> = empties
            .iter()
            .copied()
            .filter(|&p| p.is_light_square() == pos.is_light_square())
            .collect();
        if same_color.is_empty() {
            empties
        } else {
            same_color
        }
    } else {
        empties
    };
    if let Some(&dest) = rng.choose(&candidates) {
        board.set(pos, Piece::EMPTY);
        board.set(dest, piece);
    }
}

/// Find an existing on-board enemy piece matching the observed piece type
/// (or, failing that, any enemy piece) and teleport it onto `pos` so the
/// particle matches the observation. Cells already scanned earlier in this
/// sweep of the window are excluded from the search to avoid double-moving
/// the same piece twice within one `coerce_board` pass.
fn pull_obs_piece_onto_board(
    board: &mut Board,
    obs: &Observation,
    dr: usize,
    df: usize,
    pos: Position,
    rng: &mut BeliefRng,
) -> bool {
    let obs_piece = obs.piece_at(dr, df);
    let enemy_color = obs_piece.color;
    let already_scanned = |p: Position| -> bool {
        if !p.in_bounds() {
            return false;
        }
        for sdr in 0..3usize {
            for sdf in 0..3usize {
                if sdr > dr || (sdr == dr && sdf >= df) {
                    continue;
                }
                if obs.absolute(sdr, sdf) == p {
                    return true;
                }
            }
        }
        false
    };
    let candidates: Vec<Position> = board
        .find_all_piece(obs_piece.piece_type, enemy_color)
        .into_iter()
        .filter(|&p| p != pos && !already_scanned(p))
        .collect();
    if let Some(&src) = prefer_same_square_color(&candidates, pos, obs_piece.piece_type, rng) {
        board.set(src, Piece::EMPTY);
        board.set(pos, obs_piece);
        return true;
    }
    // No on-board piece of the exact observed type: repurpose an arbitrary
    // enemy piece by changing its type, matching the original's fallback of
    // "convert an arbitrary enemy piece's type" rather than failing outright.
    let any_enemy: Vec<Position> = all_positions()
        .into_iter()
        .filter(|&p| p != pos && board.get(p).color == enemy_color && !already_scanned(p))
        .collect();
    if let Some(&src) = rng.choose(&any_enemy) {
        board.set(src, Piece::EMPTY);
        board.set(pos, obs_piece);
        return true;
    }
    false
}

fn prefer_same_square_color<'a>(
    candidates: &'a [Position],
    pos: Position,
    piece_type: PieceType,
    rng: &mut BeliefRng,
) -> Option<&'a Position> {
    if piece_type == PieceType::Bishop {
        let same_color: Vec<&Position> = candidates
            .iter()
            .filter(|&&p| p.is_light_square() == pos.is_light_square())
            .collect();
        if let Some(&&chosen) = rng.choose(&same_color) {
            return candidates.iter().find(|&&p| p == chosen);
        }
    }
    rng.choose(candidates)
}

/// Teleport a random enemy piece onto `pos` (used when a reported capture
/// lands on a square the particle believes is empty).
fn relocate_missing_enemy_piece(board: &mut Board, pos: Position, rng: &mut BeliefRng) -> bool {
    let enemy_positions: Vec<Position> = all_positions()
        .into_iter()
        .filter(|&p| p != pos && !board.get(p).is_empty())
        .collect();
    if let Some(&src) = rng.choose(&enemy_positions) {
        let piece = board.get(src);
        board.set(src, Piece::EMPTY);
        board.set(pos, piece);
        true
    } else {
        false
    }
}

fn all_positions() -> Vec<Position> {
    let mut out = Vec::with_capacity(64);
    for rank in 0..8i8 {
        for file in 0..8i8 {
            out.push(Position::new(rank, file));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Color;
    use pretty_assertions::assert_eq;

    fn small_belief(board: Board, count: usize) -> StateDistribution {
        StateDistribution::reinitialize(board, count)
    }

    #[test]
    fn check_valid_passes_on_identical_particles() {
        let belief = small_belief(Board::initial(), 10);
        assert!(belief.check_valid(Color::White));
    }

    #[test]
    fn check_valid_fails_when_own_pieces_diverge() {
        let mut belief = small_belief(Board::initial(), 2);
        belief.particles[1].set(Position::new(1, 0), Piece::EMPTY);
        assert!(!belief.check_valid(Color::White));
    }

    #[test]
    fn entropy_is_zero_when_all_particles_agree() {
        let belief = small_belief(Board::initial(), 20);
        let e = belief.square_entropy(Position::new(6, 0), Color::Black);
        assert_eq!(e, 0.0);
    }

    #[test]
    fn entropy_is_positive_when_particles_disagree() {
        let mut rng = BeliefRng::from_seed(3);
        let mut belief = small_belief(Board::empty(), 20);
        for board in belief.particles.iter_mut() {
            let file = rng.gen_range(0, 8) as i8;
            board.set(Position::new(4, file), Piece::new(Color::Black, PieceType::Knight));
        }
        let mut any_positive = false;
        for file in 0..8 {
            if belief.square_entropy(Position::new(4, file), Color::Black) > 0.0 {
                any_positive = true;
            }
        }
        assert!(any_positive);
    }

    #[test]
    fn subsample_preserves_count() {
        let belief = small_belief(Board::initial(), 50);
        let mut rng = BeliefRng::from_seed(1);
        let sub = belief.subsample(10, &mut rng);
        assert_eq!(sub.len(), 10);
    }

    #[test]
    fn update_groups_particles_by_resulting_move_and_upsamples() {
        let belief = small_belief(Board::initial(), 30);
        let mut rng = BeliefRng::from_seed(9);
        let mv = Move::new(Position::new(1, 4), Position::new(3, 4));
        let (groups, win_fraction) = belief.update(mv, &mut rng);
        assert_eq!(win_fraction, 0.0);
        let total: usize = groups.iter().map(|(_, dist)| dist.len()).sum();
        assert_eq!(total, 30);
    }

    #[test]
    fn update_random_reports_win_fraction_via_king_capture() {
        let mut board = Board::empty();
        board.set(Position::new(0, 0), Piece::new(Color::White, PieceType::Queen));
        board.set(Position::new(7, 0), Piece::new(Color::Black, PieceType::King));
        let belief = small_belief(board, 5);
        let mut rng = BeliefRng::from_seed(5);
        let mv = Move::new(Position::new(0, 0), Position::new(7, 0));
        let (groups, win_fraction) = belief.update(mv, &mut rng);
        assert_eq!(win_fraction, 1.0);
        assert!(groups.is_empty());
    }

    #[test]
    fn heuristic_value_rewards_advanced_pawns_over_their_own_back_rank() {
        let mut rng = BeliefRng::from_seed(2);
        let mut pushed = Board::empty();
        pushed.set(Position::new(0, 4), Piece::new(Color::White, PieceType::King));
        pushed.set(Position::new(7, 4), Piece::new(Color::Black, PieceType::King));
        pushed.set(Position::new(5, 0), Piece::new(Color::White, PieceType::Pawn));
        let unpushed = {
            let mut b = pushed.clone();
            b.set(Position::new(5, 0), Piece::EMPTY);
            b.set(Position::new(1, 0), Piece::new(Color::White, PieceType::Pawn));
            b
        };
        let pushed_value = small_belief(pushed, 1).heuristic_value(Color::White, &mut rng, 1);
        let unpushed_value = small_belief(unpushed, 1).heuristic_value(Color::White, &mut rng, 1);
        assert!(
            pushed_value > unpushed_value,
            "advanced pawn should score higher: {pushed_value} vs {unpushed_value}"
        );
    }

    #[test]
    fn observe_repairs_particles_to_match_the_window() {
        let mut belief = small_belief(Board::initial(), 40);
        // Move a black knight to an unexpected square on half the particles
        // so the filter has something to repair.
        let mut rng = BeliefRng::from_seed(11);
        for (i, board) in belief.particles.iter_mut().enumerate() {
            if i % 2 == 0 {
                let piece = board.get(Position::new(7, 1));
                board.set(Position::new(7, 1), Piece::EMPTY);
                board.set(Position::new(5, 2), piece);
            }
        }
        let mut cells = [[Piece::EMPTY; 3]; 3];
        cells[1][1] = Piece::new(Color::Black, PieceType::Knight);
        let obs = Observation::new(cells, Position::new(4, 1));
        let result = belief.observe(&obs, Color::White, &mut rng);
        assert!(result.is_ok());
        assert_eq!(belief.len(), 40);
        for board in belief.particles() {
            assert_eq!(board.get(Position::new(5, 2)).piece_type, PieceType::Knight);
        }
    }
}
