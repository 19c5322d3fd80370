//! Board geometry helpers shared by the move ranker and the searchers.

use shakmaty::attacks;
use shakmaty::{Bitboard, Chess, Color, Move, Position, Role, Square};

/// Chebyshev distance between two squares.
pub fn distance(a: Square, b: Square) -> i32 {
    let df = (a.file() as i32 - b.file() as i32).abs();
    let dr = (a.rank() as i32 - b.rank() as i32).abs();
    df.max(dr)
}

/// Rank of `sq` from `side`'s point of view (0 = own back rank).
pub fn relative_rank(side: Color, sq: Square) -> i32 {
    match side {
        Color::White => sq.rank() as i32,
        Color::Black => 7 - sq.rank() as i32,
    }
}

/// Distance of a file from the nearest board edge (0 for a/h, 3 for d/e).
pub fn edge_distance(file: shakmaty::File) -> i32 {
    let f = file as i32;
    f.min(7 - f)
}

/// Attacks of `role` from `sq` on an empty board.
pub fn pseudo_attacks(role: Role, sq: Square) -> Bitboard {
    match role {
        Role::Knight => attacks::knight_attacks(sq),
        Role::King => attacks::king_attacks(sq),
        Role::Bishop => attacks::bishop_attacks(sq, Bitboard::EMPTY),
        Role::Rook => attacks::rook_attacks(sq, Bitboard::EMPTY),
        Role::Queen => {
            attacks::bishop_attacks(sq, Bitboard::EMPTY) | attacks::rook_attacks(sq, Bitboard::EMPTY)
        }
        Role::Pawn => Bitboard::EMPTY,
    }
}

/// Attacks of `role` from `sq` over the given occupancy.
pub fn attacks_from(role: Role, sq: Square, occupied: Bitboard) -> Bitboard {
    match role {
        Role::Knight => attacks::knight_attacks(sq),
        Role::King => attacks::king_attacks(sq),
        Role::Bishop => attacks::bishop_attacks(sq, occupied),
        Role::Rook => attacks::rook_attacks(sq, occupied),
        Role::Queen => attacks::bishop_attacks(sq, occupied) | attacks::rook_attacks(sq, occupied),
        Role::Pawn => Bitboard::EMPTY,
    }
}

/// Squares from which `role` would give check to the king of `defender`.
pub fn check_squares(pos: &Chess, defender: Color, role: Role) -> Bitboard {
    let king = king_square(pos, defender);
    attacks_from(role, king, pos.board().occupied())
}

/// The ring of squares around the king of `side`.
pub fn king_ring(pos: &Chess, side: Color) -> Bitboard {
    attacks::king_attacks(king_square(pos, side))
}

/// King square of `side`. A legal position always has both kings.
pub fn king_square(pos: &Chess, side: Color) -> Square {
    pos.board()
        .king_of(side)
        .expect("legal position has both kings")
}

/// Squares strictly between `a` and `b` (empty unless aligned).
pub fn between(a: Square, b: Square) -> Bitboard {
    attacks::between(a, b)
}

/// Destination square of a move. Castling is encoded king-takes-rook, so the
/// destination of a castling move is the rook square, as in the ranker's
/// geometry terms.
pub fn move_to(m: &Move) -> Square {
    m.to()
}

/// Origin square of a move. Only drops lack one, and crazyhouse is not
/// played here.
pub fn move_from(m: &Move) -> Square {
    m.from().expect("chess moves always have an origin square")
}

/// Whether the destination of a pawn push is one step from promotion.
pub fn is_advanced_pawn_push(side: Color, m: &Move) -> bool {
    m.role() == Role::Pawn && relative_rank(side, move_to(m)) == 6
}

/// Whether moving away from `from` unblocks a friendly pawn standing one
/// rank from promotion.
pub fn frees_promotion_square(pos: &Chess, side: Color, from: Square) -> bool {
    if relative_rank(side, from) != 7 {
        return false;
    }
    let behind = match side {
        Color::White => from.offset(-8),
        Color::Black => from.offset(8),
    };
    match behind {
        Some(sq) => pos
            .board()
            .piece_at(sq)
            .is_some_and(|p| p.color == side && p.role == Role::Pawn),
        None => false,
    }
}

/// Play `m` on a copy of `pos`.
pub fn play(pos: &Chess, m: &Move) -> Chess {
    let mut child = pos.clone();
    child.play_unchecked(m);
    child
}

/// Number of legal king moves in `pos`.
pub fn legal_king_moves(pos: &Chess) -> usize {
    pos.legal_moves()
        .iter()
        .filter(|m| m.role() == Role::King)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::fen::Fen;
    use shakmaty::CastlingMode;

    fn pos(fen: &str) -> Chess {
        fen.parse::<Fen>()
            .unwrap()
            .into_position(CastlingMode::Standard)
            .unwrap()
    }

    #[test]
    fn distance_is_chebyshev() {
        assert_eq!(distance(Square::A1, Square::A1), 0);
        assert_eq!(distance(Square::A1, Square::H8), 7);
        assert_eq!(distance(Square::E4, Square::F6), 2);
    }

    #[test]
    fn relative_rank_flips_for_black() {
        assert_eq!(relative_rank(Color::White, Square::E2), 1);
        assert_eq!(relative_rank(Color::Black, Square::E2), 6);
    }

    #[test]
    fn edge_distance_center_files() {
        assert_eq!(edge_distance(shakmaty::File::A), 0);
        assert_eq!(edge_distance(shakmaty::File::D), 3);
        assert_eq!(edge_distance(shakmaty::File::H), 0);
    }

    #[test]
    fn knight_check_squares() {
        // White knight checks the black king on e8 from c7, d6, f6, g7
        let p = pos("4k3/8/8/8/8/8/8/4K3 w - - 0 1");
        let cs = check_squares(&p, Color::Black, Role::Knight);
        assert!(cs.contains(Square::D6));
        assert!(cs.contains(Square::F6));
        assert!(!cs.contains(Square::E6));
    }

    #[test]
    fn advanced_pawn_push_detected() {
        let p = pos("4k3/8/8/8/8/8/P7/4K3 w - - 0 1");
        let push = p
            .legal_moves()
            .iter()
            .find(|m| m.role() == Role::Pawn)
            .cloned()
            .unwrap();
        // a2a3/a2a4 are not advanced pushes
        assert!(!is_advanced_pawn_push(Color::White, &push));

        let p7 = pos("4k3/8/P7/8/8/8/8/4K3 w - - 0 1");
        let to_seventh = p7
            .legal_moves()
            .iter()
            .find(|m| m.role() == Role::Pawn)
            .cloned()
            .unwrap();
        assert!(is_advanced_pawn_push(Color::White, &to_seventh));
    }

    #[test]
    fn promotion_square_freeing() {
        // White knight on a8 blocks the a7 pawn's promotion square
        let p = pos("N3k3/P7/8/8/8/8/8/4K3 w - - 0 1");
        assert!(frees_promotion_square(&p, Color::White, Square::A8));
        assert!(!frees_promotion_square(&p, Color::White, Square::B8));
    }

    #[test]
    fn legal_king_moves_counts_only_king() {
        let p = pos("4k3/8/8/8/8/8/8/R3K3 w - - 0 1");
        let king = legal_king_moves(&p);
        assert!(king >= 4);
        assert!(king < p.legal_moves().len());
    }
}
