//! The RBC board model: an 8x8 mailbox of `Piece`, pseudo-legal move
//! generation, and a move-application state machine with no concept of
//! check, checkmate, or draw rules. A particle in the belief filter is just
//! one of these boards; `apply_move` must tolerate being asked to play a
//! move that isn't actually available on this particular particle (it slides
//! as far as it can and reports whatever actually happened), since different
//! particles can legitimately disagree about where the opponent's pieces
//! are.

use crate::moves::{Capture, Move, MoveResult};
use crate::piece::{Color, Piece, PieceType};
use crate::position::{Position, BOARD_SIZE};
use crate::rng::BeliefRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl CastlingRights {
    pub const ALL: CastlingRights = CastlingRights {
        white_kingside: true,
        white_queenside: true,
        black_kingside: true,
        black_queenside: true,
    };

    pub const NONE: CastlingRights = CastlingRights {
        white_kingside: false,
        white_queenside: false,
        black_kingside: false,
        black_queenside: false,
    };
}

#[derive(Debug, Clone)]
pub struct Board {
    pub squares: [[Piece; 8]; 8],
    pub castling_rights: CastlingRights,
    pub en_passant_target: Position,
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl Board {
    pub fn empty() -> Self {
        Board {
            squares: [[Piece::EMPTY; 8]; 8],
            castling_rights: CastlingRights::NONE,
            en_passant_target: Position::NONE,
        }
    }

    pub fn initial() -> Self {
        let mut board = Board::empty();
        let back_rank = [
            PieceType::Rook,
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Queen,
            PieceType::King,
            PieceType::Bishop,
            PieceType::Knight,
            PieceType::Rook,
        ];
        for (file, pt) in back_rank.iter().enumerate() {
            board.squares[0][file] = Piece::new(Color::White, *pt);
            board.squares[7][file] = Piece::new(Color::Black, *pt);
        }
        for file in 0..8 {
            board.squares[1][file] = Piece::new(Color::White, PieceType::Pawn);
            board.squares[6][file] = Piece::new(Color::Black, PieceType::Pawn);
        }
        board.castling_rights = CastlingRights::ALL;
        board
    }

    pub fn get(&self, pos: Position) -> Piece {
        if !pos.in_bounds() {
            return Piece::EMPTY;
        }
        self.squares[pos.rank as usize][pos.file as usize]
    }

    pub fn set(&mut self, pos: Position, piece: Piece) {
        self.squares[pos.rank as usize][pos.file as usize] = piece;
    }

    pub fn find_all_piece(&self, piece_type: PieceType, color: Color) -> Vec<Position> {
        let mut out = Vec::new();
        for rank in 0..8 {
            for file in 0..8 {
                let p = self.squares[rank][file];
                if p.piece_type == piece_type && p.color == color {
                    out.push(Position::new(rank as i8, file as i8));
                }
            }
        }
        out
    }

    pub fn find_all_color(&self, color: Color) -> Vec<Position> {
        let mut out = Vec::new();
        for rank in 0..8 {
            for file in 0..8 {
                if self.squares[rank][file].color == color {
                    out.push(Position::new(rank as i8, file as i8));
                }
            }
        }
        out
    }

    /// All pseudo-legal moves for `color`, with no check/checkmate
    /// filtering. Includes the intentionally "illegal" pawn diagonal probes
    /// (a diagonal step into an empty, non-en-passant square) since RBC
    /// agents are allowed to request them — they simply waste the turn.
    pub fn generate_moves(&self, color: Color) -> Vec<Move> {
        let mut moves = Vec::new();
        for rank in 0..8 {
            for file in 0..8 {
                let pos = Position::new(rank as i8, file as i8);
                let piece = self.squares[rank][file];
                if piece.color == color {
                    self.moves_for_piece(pos, piece, &mut moves);
                }
            }
        }
        moves
    }

    fn moves_for_piece(&self, pos: Position, piece: Piece, out: &mut Vec<Move>) {
        match piece.piece_type {
            PieceType::Pawn => self.generate_pawn_moves(pos, piece.color, out),
            PieceType::Knight => self.generate_knight_moves(pos, piece.color, out),
            PieceType::Bishop => self.generate_sliding_moves(pos, piece.color, &DIAGONAL_DIRS, out),
            PieceType::Rook => self.generate_sliding_moves(pos, piece.color, &STRAIGHT_DIRS, out),
            PieceType::Queen => self.generate_sliding_moves(pos, piece.color, &ALL_DIRS, out),
            PieceType::King => self.generate_king_moves(pos, piece.color, out),
            PieceType::Empty => {}
        }
    }

    fn generate_pawn_moves(&self, pos: Position, color: Color, out: &mut Vec<Move>) {
        let (dir, start_rank): (i8, i8) = match color {
            Color::White => (1, 1),
            _ => (-1, 6),
        };
        let forward = pos.offset(dir, 0);
        if forward.in_bounds() && self.get(forward).is_empty() {
            out.push(Move::new(pos, forward));
            if pos.rank == start_rank {
                let double = pos.offset(dir * 2, 0);
                if double.in_bounds() && self.get(double).is_empty() {
                    out.push(Move::new(pos, double));
                }
            }
        }
        for df in [-1i8, 1] {
            let target = pos.offset(dir, df);
            if target.in_bounds() && self.get(target).color != color {
                // Diagonal moves are generated onto empty squares too, not
                // just opponent-occupied ones: RBC agents may request this
                // "probe" move, it just wastes the turn.
                out.push(Move::new(pos, target));
            }
        }
    }

    fn generate_knight_moves(&self, pos: Position, color: Color, out: &mut Vec<Move>) {
        const OFFSETS: [(i8, i8); 8] = [
            (-2, -1), (-2, 1), (-1, -2), (-1, 2),
            (1, -2), (1, 2), (2, -1), (2, 1),
        ];
        for (dr, df) in OFFSETS {
            let target = pos.offset(dr, df);
            if target.in_bounds() && self.get(target).color != color {
                out.push(Move::new(pos, target));
            }
        }
    }

    fn generate_sliding_moves(&self, pos: Position, color: Color, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
        for &(dr, df) in dirs {
            let mut cur = pos.offset(dr, df);
            while cur.in_bounds() {
                let occupant = self.get(cur);
                if occupant.is_empty() {
                    out.push(Move::new(pos, cur));
                } else {
                    if occupant.color != color {
                        out.push(Move::new(pos, cur));
                    }
                    break;
                }
                cur = cur.offset(dr, df);
            }
        }
    }

    fn generate_king_moves(&self, pos: Position, color: Color, out: &mut Vec<Move>) {
        for &(dr, df) in ALL_DIRS.iter() {
            let target = pos.offset(dr, df);
            if target.in_bounds() && self.get(target).color != color {
                out.push(Move::new(pos, target));
            }
        }

        let back_rank = if color == Color::White { 0 } else { 7 };
        if pos.rank != back_rank || pos.file != 4 {
            return;
        }
        let (kingside, queenside) = match color {
            Color::White => (
                self.castling_rights.white_kingside,
                self.castling_rights.white_queenside,
            ),
            _ => (
                self.castling_rights.black_kingside,
                self.castling_rights.black_queenside,
            ),
        };
        if kingside
            && self.get(Position::new(back_rank, 5)).is_empty()
            && self.get(Position::new(back_rank, 6)).is_empty()
        {
            out.push(Move::new(pos, Position::new(back_rank, 6)));
        }
        if queenside
            && self.get(Position::new(back_rank, 1)).is_empty()
            && self.get(Position::new(back_rank, 2)).is_empty()
            && self.get(Position::new(back_rank, 3)).is_empty()
        {
            out.push(Move::new(pos, Position::new(back_rank, 2)));
        }
    }

    /// Swap whatever is at `from` into `to`, clearing `from` and the
    /// en-passant target. Returns the piece that was captured, if any.
    /// `from == to` is a no-op (the "wasted move" case) and always reports
    /// no capture.
    fn move_piece(&mut self, from: Position, to: Position) -> Capture {
        self.en_passant_target = Position::NONE;
        if from == to {
            return Capture::NONE;
        }
        let piece = self.get(from);
        let captured = self.get(to);
        self.set(to, piece);
        self.set(from, Piece::EMPTY);
        if captured.is_empty() {
            Capture::NONE
        } else {
            Capture::new(captured, to)
        }
    }

    /// Slide from `from` toward `to` along their shared direction, stopping
    /// at the first occupied square (landing on it only if `allow_capture`
    /// and it's an opponent piece). Reports whatever square was actually
    /// reached, which may be short of `to` or equal to `from` if the first
    /// step is already blocked.
    fn apply_move_linear(&mut self, from: Position, to: Position, color: Color, allow_capture: bool) -> MoveResult {
        let dr = (to.rank - from.rank).signum();
        let df = (to.file - from.file).signum();
        let steps = (to.rank - from.rank).abs().max((to.file - from.file).abs());
        let mut landed = from;
        for _ in 0..steps {
            let next = landed.offset(dr, df);
            let occupant = self.get(next);
            if occupant.is_empty() {
                landed = next;
                continue;
            }
            if occupant.color != color && allow_capture {
                landed = next;
            }
            break;
        }
        let capture = self.move_piece(from, landed);
        MoveResult::new(Move::new(from, landed), capture)
    }

    fn apply_move_pawn(&mut self, from: Position, to: Position, color: Color) -> MoveResult {
        if from.file == to.file {
            let result = self.apply_move_linear(from, to, color, false);
            if (result.mv.to.rank - from.rank).abs() == 2 {
                self.en_passant_target = Position::new((from.rank + result.mv.to.rank) / 2, from.file);
            }
            return result;
        }

        let target_piece = self.get(to);
        if !target_piece.is_empty() && target_piece.color != color {
            let capture = self.move_piece(from, to);
            return MoveResult::new(Move::new(from, to), capture);
        }
        if to == self.en_passant_target {
            let captured_pos = Position::new(from.rank, to.file);
            let captured_piece = self.get(captured_pos);
            self.move_piece(from, to);
            self.set(captured_pos, Piece::EMPTY);
            self.en_passant_target = Position::NONE;
            return MoveResult::new(Move::new(from, to), Capture::new(captured_piece, captured_pos));
        }
        // Diagonal step into an empty, non-en-passant square: an
        // intentionally allowed "probe" move that simply wastes the turn.
        MoveResult::wasted(from)
    }

    fn apply_move_king(&mut self, from: Position, to: Position, color: Color) -> MoveResult {
        let file_delta = to.file - from.file;
        if file_delta.abs() == 2 {
            let back_rank = from.rank;
            let kingside = file_delta > 0;
            let can_castle = match (color, kingside) {
                (Color::White, true) => self.castling_rights.white_kingside,
                (Color::White, false) => self.castling_rights.white_queenside,
                (Color::Black, true) => self.castling_rights.black_kingside,
                (Color::Black, false) => self.castling_rights.black_queenside,
                (Color::Empty, _) => false,
            };
            let (rook_from, rook_to, empty_files): (Position, Position, &[i8]) = if kingside {
                (
                    Position::new(back_rank, 7),
                    Position::new(back_rank, 5),
                    &[5, 6],
                )
            } else {
                (
                    Position::new(back_rank, 0),
                    Position::new(back_rank, 3),
                    &[1, 2, 3],
                )
            };
            let squares_clear = empty_files
                .iter()
                .all(|&file| self.get(Position::new(back_rank, file)).is_empty());
            if !can_castle || !squares_clear {
                return MoveResult::wasted(from);
            }
            self.move_piece(from, to);
            self.move_piece(rook_from, rook_to);
            self.revoke_castling_rights(color);
            return MoveResult::new(Move::new(from, to), Capture::NONE);
        }
        self.revoke_castling_rights(color);
        let capture = self.move_piece(from, to);
        MoveResult::new(Move::new(from, to), capture)
    }

    fn apply_move_rook(&mut self, from: Position, to: Position, color: Color) -> MoveResult {
        self.revoke_rook_corner(from, color);
        self.apply_move_linear(from, to, color, true)
    }

    fn apply_move_knight(&mut self, from: Position, to: Position) -> MoveResult {
        let capture = self.move_piece(from, to);
        MoveResult::new(Move::new(from, to), capture)
    }

    fn revoke_castling_rights(&mut self, color: Color) {
        match color {
            Color::White => {
                self.castling_rights.white_kingside = false;
                self.castling_rights.white_queenside = false;
            }
            Color::Black => {
                self.castling_rights.black_kingside = false;
                self.castling_rights.black_queenside = false;
            }
            Color::Empty => {}
        }
    }

    fn revoke_rook_corner(&mut self, pos: Position, color: Color) {
        match (color, pos.rank, pos.file) {
            (Color::White, 0, 0) => self.castling_rights.white_queenside = false,
            (Color::White, 0, 7) => self.castling_rights.white_kingside = false,
            (Color::Black, 7, 0) => self.castling_rights.black_queenside = false,
            (Color::Black, 7, 7) => self.castling_rights.black_kingside = false,
            _ => {}
        }
    }

    /// Apply `mv` to this board and report what actually happened. Tolerant
    /// of moves that aren't available from this exact position — the move
    /// is carried out as far as the board's own state allows (see
    /// `apply_move_linear`), never panics on an unreachable destination.
    pub fn apply_move(&mut self, mv: Move) -> MoveResult {
        let piece = self.get(mv.from);
        debug_assert!(!piece.is_empty(), "apply_move called on an empty square");
        if piece.is_empty() {
            return MoveResult::wasted(mv.from);
        }
        let result = match piece.piece_type {
            PieceType::Pawn => self.apply_move_pawn(mv.from, mv.to, piece.color),
            PieceType::Knight => self.apply_move_knight(mv.from, mv.to),
            PieceType::King => self.apply_move_king(mv.from, mv.to, piece.color),
            PieceType::Rook => self.apply_move_rook(mv.from, mv.to, piece.color),
            PieceType::Bishop => self.apply_move_linear(mv.from, mv.to, piece.color, true),
            PieceType::Queen => self.apply_move_linear(mv.from, mv.to, piece.color, true),
            PieceType::Empty => unreachable!(),
        };
        if result.capture.piece.piece_type == PieceType::Rook {
            self.revoke_rook_corner(result.capture.position, result.capture.piece.color);
        }
        result
    }

    /// Play a uniformly random legal move for a uniformly random own piece
    /// that has at least one move available. Used for opponent rollouts,
    /// where we have no observation of what the opponent will actually do.
    pub fn do_random_move(&mut self, color: Color, rng: &mut BeliefRng) -> MoveResult {
        let mut candidates = self.find_all_color(color);
        while !candidates.is_empty() {
            let idx = rng.choose_index(&candidates).expect("candidates nonempty");
            let pos = candidates[idx];
            let piece = self.get(pos);
            let mut moves = Vec::new();
            self.moves_for_piece(pos, piece, &mut moves);
            if let Some(mv) = rng.choose(&moves) {
                return self.apply_move(*mv);
            }
            candidates.swap_remove(idx);
        }
        MoveResult::wasted(Position::NONE)
    }
}

const STRAIGHT_DIRS: [(i8, i8); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
const DIAGONAL_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ALL_DIRS: [(i8, i8); 8] = [
    (0, 1), (0, -1), (1, 0), (-1, 0),
    (1, 1), (1, -1), (-1, 1), (-1, -1),
];
