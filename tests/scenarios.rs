//! End-to-end scenarios exercising the belief filter, planner and driver
//! together, one per behavior called out as load-bearing: a trivial material
//! grab, the scripted opening, sense selection under ambiguity, an
//! en-passant round trip, castling rights revocation, and a wasted move.

use chess::belief::StateDistribution;
use chess::board::Board;
use chess::driver::Agent;
use chess::moves::Move;
use chess::piece::{Color, Piece, PieceType};
use chess::planner::{self, PlannerConfig};
use chess::position::Position;
use chess::rng::BeliefRng;
use pretty_assertions::assert_eq;

fn strip_pawns(mut board: Board) -> Board {
    for file in 0..8 {
        board.set(Position::new(1, file), Piece::EMPTY);
        board.set(Position::new(6, file), Piece::EMPTY);
    }
    board
}

/// S1: with every pawn removed, a clear material grab onto the back rank is
/// the dominant choice across repeated searches.
#[test]
fn trivial_capture_prefers_a_back_rank_piece_that_advances_material() {
    let board = strip_pawns(Board::initial());
    let belief = StateDistribution::reinitialize(board.clone(), 16);
    let config = PlannerConfig {
        base_iterations: 1000,
        base_rollout_depth: 15,
        rollout_particles: 16,
        heuristic_samples: 4,
        ..PlannerConfig::default()
    };

    let mut capturing_wins = 0;
    let trials = 8;
    for seed in 0..trials {
        let mut rng = BeliefRng::from_seed(seed);
        let result = planner::choose_move(&belief, Color::White, &config, config.total_budget_secs, &mut rng);
        assert_eq!(board.get(result.mv.from).color, Color::White);
        if board.get(result.mv.to).color == Color::Black {
            capturing_wins += 1;
        }
    }
    assert!(
        capturing_wins as f64 / trials as f64 > 0.5,
        "expected a back-rank piece to capture an enemy piece in most trials, got {capturing_wins}/{trials}"
    );
}

/// S2: the scripted opening plays e2e4 then bishop-b5 for White, verbatim.
#[test]
fn scripted_opening_reproduces_e4_then_bishop_b5() {
    let mut agent = Agent::new(PlannerConfig::default(), 32, BeliefRng::from_seed(5));
    agent.handle_game_start(Color::White);

    let first = agent.choose_move(600.0);
    assert_eq!(first, Move::new(Position::new(1, 4), Position::new(3, 4)));
    agent.handle_move_result(first, false, Position::NONE);

    let second = agent.choose_move(600.0);
    assert_eq!(second, Move::new(Position::new(0, 5), Position::new(4, 1)));
}

/// S3: a belief split only at (4,4) makes that square's 3x3 window the
/// highest-entropy choice.
#[test]
fn sense_selection_targets_the_only_ambiguous_square() {
    let mut agent = Agent::new(PlannerConfig::default(), 8, BeliefRng::from_seed(9));
    agent.our_color = Color::White;

    let mut has_knight = Board::initial();
    has_knight.set(Position::new(4, 4), Piece::new(Color::Black, PieceType::Knight));
    let mut empty = Board::initial();
    empty.set(Position::new(4, 4), Piece::EMPTY);

    agent.belief = StateDistribution::from_particles(vec![has_knight, empty]);
    let sense = agent.choose_sense(&[], &[], 600.0);
    assert_eq!(sense, Position::new(4, 4));
}

/// S4: an en-passant capture round trip through `generate_moves` and
/// `apply_move`.
#[test]
fn en_passant_round_trip_reports_the_passed_pawn_as_captured() {
    let mut board = Board::initial();
    board.set(Position::new(1, 0), Piece::EMPTY);
    board.set(Position::new(4, 0), Piece::new(Color::White, PieceType::Pawn));

    let black_double_push = Move::new(Position::new(6, 1), Position::new(4, 1));
    board.apply_move(black_double_push);
    assert_eq!(board.en_passant_target, Position::new(5, 1));

    let white_moves = board.generate_moves(Color::White);
    let en_passant = Move::new(Position::new(4, 0), Position::new(5, 1));
    assert!(white_moves.contains(&en_passant));

    let result = board.apply_move(en_passant);
    assert_eq!(result.capture.piece, Piece::new(Color::Black, PieceType::Pawn));
    assert_eq!(result.capture.position, Position::new(4, 1));
    assert_eq!(board.get(Position::new(5, 1)).piece_type, PieceType::Pawn);
    assert!(board.get(Position::new(4, 0)).is_empty());
    assert!(board.get(Position::new(4, 1)).is_empty());
}

/// S5: moving the queenside rook off its home square revokes that side's
/// castling rights, even though the king hasn't moved.
#[test]
fn castling_is_denied_after_the_rook_moves() {
    let mut board = Board::initial();
    board.set(Position::new(0, 1), Piece::EMPTY);
    board.set(Position::new(0, 2), Piece::EMPTY);
    board.set(Position::new(0, 3), Piece::EMPTY);

    board.apply_move(Move::new(Position::new(0, 0), Position::new(0, 1)));

    let king_moves: Vec<Move> = board
        .generate_moves(Color::White)
        .into_iter()
        .filter(|mv| mv.from == Position::new(0, 4) && (mv.to.file - mv.from.file).abs() == 2)
        .collect();
    assert!(king_moves.is_empty());
    assert!(!board.castling_rights.white_queenside);
}

/// S6: an unavailable pawn diagonal probe wastes the move without changing
/// the board.
#[test]
fn wasted_move_leaves_the_piece_in_place() {
    let mut board = Board::initial();
    let probe = Move::new(Position::new(1, 0), Position::new(2, 1));
    let before = board.get(Position::new(1, 0));

    let result = board.apply_move(probe);

    assert_eq!(result.mv.to, Position::new(1, 0));
    assert!(result.mv.is_wasted());
    assert_eq!(board.get(Position::new(1, 0)), before);
}
