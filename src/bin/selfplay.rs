//! Play one full game between two independent agents, each maintaining its
//! own belief over the other's position, and print a summary. Useful for
//! eyeballing end-to-end behavior without a match server.

use chess::board::Board;
use chess::driver::Agent;
use chess::piece::{Color, PieceType};
use chess::planner::PlannerConfig;
use chess::rng::BeliefRng;

const MAX_PLIES: u32 = 150;
const SECONDS_LEFT: f64 = 600.0;

fn agent(seed: u64) -> Agent {
    Agent::new(
        PlannerConfig {
            base_iterations: 200,
            rollout_particles: 64,
            ..Default::default()
        },
        512,
        BeliefRng::from_seed(seed),
    )
}

fn main() {
    chess::init_tracing();

    let mut white = agent(1);
    let mut black = agent(2);
    white.handle_game_start(Color::White);
    black.handle_game_start(Color::Black);

    let mut board = Board::initial();
    let mut to_move = Color::White;
    let mut winner = None;

    for ply in 0..MAX_PLIES {
        let (mover, other) = if to_move == Color::White {
            (&mut white, &mut black)
        } else {
            (&mut black, &mut white)
        };

        let requested = mover.choose_move(SECONDS_LEFT);
        let result = board.apply_move(requested);
        let captured = !result.capture.is_none();

        mover.handle_move_result(result.mv, captured, result.capture.position);
        other.handle_opponent_move_result(captured, result.capture.position);

        if result.capture.piece.piece_type == PieceType::King {
            winner = Some(to_move);
            eprintln!("ply {ply}: {to_move} captures the king ({}->{})", result.mv.from, result.mv.to);
            break;
        }

        to_move = to_move.opponent();
    }

    match winner {
        Some(color) => eprintln!("game over: {color} wins"),
        None => eprintln!("game over: move limit reached, no king captured"),
    }
}
