//! The agent: glues the particle-filter belief and the POMCP planner to the
//! seven turn callbacks an outer match driver calls in the canonical order
//! `opponent_move_result -> choose_sense -> sense_result -> choose_move ->
//! move_result` (plus the one-time `game_start`/`game_end` bookends).

use crate::belief::{StateDistribution, N_PARTICLES};
use crate::board::Board;
use crate::moves::{Move, Observation};
use crate::piece::{Color, Piece, PieceType};
use crate::planner::{self, PlannerConfig};
use crate::position::Position;
use crate::rng::BeliefRng;
use tracing::{info, instrument, warn};

/// One entry in the scripted opening book: the move to play, and the piece
/// we expect to find at its origin square. If the belief's particle 0 no
/// longer shows that piece there (because a previous move diverged from
/// what we scripted), the opening is abandoned for the rest of the game.
struct OpeningStep {
    mv: Move,
    expected_at_from: Piece,
}

fn scripted_opening(color: Color) -> Vec<OpeningStep> {
    let pawn = Piece::new(color, PieceType::Pawn);
    let bishop = Piece::new(color, PieceType::Bishop);
    match color {
        Color::White => vec![
            OpeningStep {
                mv: Move::new(Position::new(1, 4), Position::new(3, 4)),
                expected_at_from: pawn,
            },
            OpeningStep {
                mv: Move::new(Position::new(0, 5), Position::new(4, 1)),
                expected_at_from: bishop,
            },
        ],
        Color::Black => vec![
            OpeningStep {
                mv: Move::new(Position::new(6, 4), Position::new(4, 4)),
                expected_at_from: pawn,
            },
            OpeningStep {
                mv: Move::new(Position::new(7, 5), Position::new(3, 1)),
                expected_at_from: bishop,
            },
        ],
        Color::Empty => Vec::new(),
    }
}

/// The agent's full turn-by-turn state: which color we are, our current
/// belief over the true board, and how far into the scripted opening we
/// are (`-1` once it's been abandoned).
pub struct Agent {
    pub our_color: Color,
    pub belief: StateDistribution,
    opening_state: i32,
    opening_book: Vec<OpeningStep>,
    rng: BeliefRng,
    planner_config: PlannerConfig,
    particle_count: usize,
}

impl Agent {
    pub fn new(planner_config: PlannerConfig, particle_count: usize, rng: BeliefRng) -> Self {
        Agent {
            our_color: Color::Empty,
            belief: StateDistribution::reinitialize(Board::empty(), 1),
            opening_state: -1,
            opening_book: Vec::new(),
            rng,
            planner_config,
            particle_count,
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Agent::new(PlannerConfig::default(), N_PARTICLES, BeliefRng::from_seed(seed))
    }

    #[instrument(skip(self))]
    pub fn handle_game_start(&mut self, color: Color) {
        self.our_color = color;
        self.opening_state = 0;
        self.opening_book = scripted_opening(color);
        self.belief
            .reinitialize_in_place(Board::initial(), self.particle_count);
        info!(?color, "game started");
    }

    #[instrument(skip(self))]
    pub fn handle_opponent_move_result(&mut self, captured: bool, square: Position) {
        let opponent = self.our_color.opponent();
        if let Err(err) =
            self.belief
                .handle_opponent_move_result(captured, square, opponent, &mut self.rng)
        {
            self.recover_from_degenerate_belief(err);
        }
    }

    /// Entropy-driven sense window: the center of the 3x3 origin in
    /// `0..=5` on each axis with the largest total enemy-piece entropy,
    /// ties broken in row-major scan order.
    #[instrument(skip(self, _possible_sense, _possible_moves))]
    pub fn choose_sense(
        &mut self,
        _possible_sense: &[Position],
        _possible_moves: &[Move],
        _seconds_left: f64,
    ) -> Position {
        let entropy = self.belief.entropy(self.our_color.opponent());
        let mut best_origin = Position::new(0, 0);
        let mut best_total = f64::NEG_INFINITY;
        for rank in 0..6 {
            for file in 0..6 {
                let total: f64 = (0..3)
                    .flat_map(|dr| (0..3).map(move |df| (dr, df)))
                    .map(|(dr, df): (i8, i8)| entropy[(rank + dr) as usize][(file + df) as usize])
                    .sum();
                if total > best_total {
                    best_total = total;
                    best_origin = Position::new(rank, file);
                }
            }
        }
        best_origin.offset(1, 1)
    }

    #[instrument(skip(self, observation))]
    pub fn handle_sense_result(&mut self, observation: &Observation) {
        if let Err(err) = self.belief.observe(observation, self.our_color, &mut self.rng) {
            self.recover_from_degenerate_belief(err);
        }
    }

    #[instrument(skip(self))]
    pub fn choose_move(&mut self, seconds_left: f64) -> Move {
        if let Some(mv) = self.scripted_move() {
            return mv;
        }
        let result = planner::choose_move_parallel(
            &self.belief,
            self.our_color,
            &self.planner_config,
            seconds_left,
            &mut self.rng,
        );
        info!(
            mv = %result.mv,
            iterations = result.iterations,
            value = result.value,
            "planner chose a move"
        );
        result.mv
    }

    /// If the opening is still active, its next step's source square still
    /// holds the piece we expect, return that move and advance; otherwise
    /// permanently disable the opening.
    fn scripted_move(&mut self) -> Option<Move> {
        if self.opening_state < 0 {
            return None;
        }
        let step = self.opening_book.get(self.opening_state as usize)?;
        let reference = self.belief.particles().first()?;
        if reference.get(step.mv.from) != step.expected_at_from {
            self.opening_state = -1;
            return None;
        }
        let mv = step.mv;
        self.opening_state += 1;
        if self.opening_state as usize >= self.opening_book.len() {
            self.opening_state = -1;
        }
        Some(mv)
    }

    #[instrument(skip(self))]
    pub fn handle_move_result(&mut self, taken_move: Move, captured: bool, captured_square: Position) {
        // If the move we actually took diverges from what the scripted
        // opening expected (wasted, or simply not the scripted move), the
        // opening no longer applies to the rest of the game.
        if self.opening_state >= 0 {
            let expected = self
                .opening_book
                .get(self.opening_state as usize - 1)
                .map(|step| step.mv);
            if expected != Some(taken_move) {
                self.opening_state = -1;
            }
        }
        if let Err(err) = self.belief.handle_move_result(
            taken_move,
            captured,
            captured_square,
            self.our_color,
            &mut self.rng,
        ) {
            self.recover_from_degenerate_belief(err);
        }
    }

    #[instrument(skip(self))]
    pub fn handle_game_end(&mut self, winner: Color, reason: &str) {
        info!(?winner, reason, "game ended");
    }

    /// Degenerate-belief recovery (spec.md §7): rebuild the belief around a
    /// "best guess" board — particle 0's last known-good state — rather
    /// than surfacing the error to the driver.
    fn recover_from_degenerate_belief(&mut self, err: anyhow::Error) {
        warn!(%err, "belief degenerate, recovering from last known-good particle");
        let fallback = self
            .belief
            .particles()
            .first()
            .cloned()
            .unwrap_or_else(Board::initial);
        self.belief.reinitialize_in_place(fallback, self.particle_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_agent() -> Agent {
        Agent::new(PlannerConfig::default(), 32, BeliefRng::from_seed(42))
    }

    #[test]
    fn game_start_reinitializes_belief_to_initial_position() {
        let mut agent = test_agent();
        agent.handle_game_start(Color::White);
        assert_eq!(agent.belief.len(), 32);
        assert!(agent.belief.check_valid(Color::White));
    }

    #[test]
    fn scripted_opening_plays_e4_then_bishop_b5_for_white() {
        let mut agent = test_agent();
        agent.handle_game_start(Color::White);
        let first = agent.choose_move(600.0);
        assert_eq!(first, Move::new(Position::new(1, 4), Position::new(3, 4)));
        agent.handle_move_result(first, false, Position::NONE);
        let second = agent.choose_move(600.0);
        assert_eq!(second, Move::new(Position::new(0, 5), Position::new(4, 1)));
    }

    #[test]
    fn opening_is_abandoned_once_the_actual_move_diverges() {
        let mut agent = test_agent();
        agent.handle_game_start(Color::White);
        let first = agent.choose_move(600.0);
        // The server reports a *different* move than what we scripted
        // (e.g. it was wasted): opening_state should cancel.
        let divergent = Move::new(first.from, first.from);
        agent.handle_move_result(divergent, false, Position::NONE);
        assert_eq!(agent.opening_state, -1);
    }

    #[test]
    fn choose_sense_prefers_the_highest_entropy_window() {
        let mut agent = test_agent();
        agent.our_color = Color::White;
        let mut board_a = Board::initial();
        let mut board_b = Board::initial();
        board_a.set(Position::new(4, 4), Piece::new(Color::Black, PieceType::Knight));
        board_b.set(Position::new(4, 4), Piece::EMPTY);
        agent.belief = StateDistribution::from_particles(vec![board_a, board_b]);
        let sense = agent.choose_sense(&[], &[], 600.0);
        assert_eq!(sense, Position::new(4, 4));
    }
}
