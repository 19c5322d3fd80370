//! Mate-oriented move ranking.
//!
//! Both searchers try moves in descending rank order. On OR plies (the
//! mating side to move) the rank reflects mating promise: checks, material,
//! king pursuit, threats against the defending king's ring. On AND plies
//! (the side being mated) it reflects defensive value: capturing or
//! intercepting the checker, setting up pins.
//!
//! Checking moves score at least 8000 and nothing else reaches 6000, so
//! `rank >= 6000` is equivalent to "gives check"; the frontier pruning in
//! both searchers relies on this band.

use shakmaty::{Chess, Color, Move, Position, Role};

use crate::attacks::{
    attacks_from, between, distance, edge_distance, frees_promotion_square, is_advanced_pawn_push,
    king_ring, king_square, move_from, move_to, play, pseudo_attacks, relative_rank,
};

/// A legal move with its heuristic rank.
#[derive(Debug, Clone)]
pub struct RankedMove {
    pub mv: Move,
    pub rank: i32,
}

/// Most-Valuable-Victim values for capture ordering.
fn mvv(role: Role) -> i32 {
    match role {
        Role::Pawn => 100,
        Role::Knight => 300,
        Role::Bishop => 305,
        Role::Rook => 500,
        Role::Queen => 900,
        Role::King => 0,
    }
}

/// Generate and rank all legal moves of `pos` at the given search ply,
/// sorted in descending rank order.
pub fn score_and_rank_moves(pos: &Chess, ply: i32) -> Vec<RankedMove> {
    let us = pos.turn();
    let them = us.other();
    let in_check = pos.checkers().any();
    let checker = pos.checkers().first();
    let our_king = king_square(pos, us);
    let their_king = king_square(pos, them);
    let ring = king_ring(pos, them);
    let occupied = pos.board().occupied();

    let mut list: Vec<RankedMove> = Vec::with_capacity(64);

    for m in pos.legal_moves() {
        let to = move_to(&m);
        let role = m.role();
        let child = play(pos, &m);

        let mut rank = 0;

        // Checking moves get a high enough rank for both sides
        if child.is_check() {
            rank += 8000;
        }

        if let Some(victim) = m.capture() {
            rank += mvv(victim);
        }

        if ply & 1 == 1 {
            // Side to get mated
            if in_check {
                // Rank moves first which capture the checking piece
                if m.is_capture() {
                    rank += 1000;
                } else if role != Role::King
                    && checker.is_some_and(|c| between(c, our_king).contains(to))
                {
                    rank += 400;
                }
            }

            // Sliders landing on a ray of the enemy king, possibly
            // creating a pin
            if role == Role::Bishop
                && pseudo_attacks(Role::Bishop, their_king).contains(to)
                && rank < 6000
            {
                rank += 200;
            } else if role == Role::Rook
                && pseudo_attacks(Role::Rook, their_king).contains(to)
                && rank < 6000
            {
                rank += 300;
            } else if role == Role::Queen
                && pseudo_attacks(Role::Queen, their_king).contains(to)
                && rank < 6000
            {
                rank += 350;
            }
        } else {
            if rank >= 6000 {
                // Checking move
                if role == Role::Knight {
                    rank += 400;
                } else if (role == Role::Queen || role == Role::Rook)
                    && distance(their_king, to) == 1
                {
                    rank += 500;
                }

                // Give an extra boost for mating moves!
                let opp_moves = child.legal_moves().len() as i32;
                rank += if opp_moves == 0 { 4096 } else { -8 * opp_moves };
            }

            if is_advanced_pawn_push(us, &m) {
                rank += 1000;
            }

            rank += king_approach_bonus(pos, us, &m, their_king);

            if frees_promotion_square(pos, us, move_from(&m)) {
                rank += 500;
            }

            rank += threat_bonus(pos, them, role, to, ring, occupied);
            rank += check_prevention_bonus(our_king, to);
        }

        list.push(RankedMove { mv: m, rank });
    }

    list.sort_unstable_by(|a, b| b.rank.cmp(&a.rank));
    list
}

/// Rank a single root move.
///
/// Same OR-parity terms as the move-loop ranker, with pawn file-edge and
/// advancement bonuses instead of the advanced-push term, and the reply
/// discriminator applied to every move rather than only checks. The king
/// mobility penalty plays the role of an R-Mobility measure.
pub fn rank_root_move(pos: &Chess, m: &Move) -> i32 {
    let us = pos.turn();
    let them = us.other();
    let our_king = king_square(pos, us);
    let their_king = king_square(pos, them);
    let ring = king_ring(pos, them);
    let occupied = pos.board().occupied();
    let to = move_to(m);
    let role = m.role();
    let child = play(pos, m);

    let mut rank = 0;

    if child.is_check() {
        rank += 8000;

        // Bonus for a knight check
        if role == Role::Knight {
            rank += 400;
        }
        // Bonus for queen/rook contact checks
        else if (role == Role::Queen || role == Role::Rook) && distance(their_king, to) == 1 {
            rank += 500;
        }
    }

    if let Some(victim) = m.capture() {
        rank += mvv(victim);
    }

    rank += king_approach_bonus(pos, us, m, their_king);

    if frees_promotion_square(pos, us, move_from(m)) {
        rank += 500;
    }

    rank += threat_bonus(pos, them, role, to, ring, occupied);

    if role == Role::Pawn {
        rank += 64 * edge_distance(to.file()) + 128 * relative_rank(us, to);
    }

    rank += check_prevention_bonus(our_king, to);

    let replies = child.legal_moves();
    let opp_moves = replies.len() as i32;
    let opp_king_moves = replies.iter().filter(|r| r.role() == Role::King).count() as i32;

    // Give an extra boost for mating moves!
    rank += if opp_moves == 0 { 4096 } else { -8 * opp_moves };
    rank -= 40 * opp_king_moves;

    rank
}

/// Bonus for the king approaching the defending king when the attacker has
/// no queen and at most one rook.
fn king_approach_bonus(pos: &Chess, us: Color, m: &Move, their_king: shakmaty::Square) -> i32 {
    let board = pos.board();
    if m.role() == Role::King
        && (board.by_color(us) & board.by_role(Role::Queen)).is_empty()
        && (board.by_color(us) & board.by_role(Role::Rook)).count() <= 1
    {
        480 - 20 * distance(move_to(m), their_king)
    } else {
        0
    }
}

/// Bonus for a piece eventually able to give check on the next move or to
/// attack squares next to the opponent's king.
fn threat_bonus(
    pos: &Chess,
    them: Color,
    role: Role,
    to: shakmaty::Square,
    ring: shakmaty::Bitboard,
    occupied: shakmaty::Bitboard,
) -> i32 {
    let (ready_check, ring_weight) = match role {
        Role::Knight => (600, 256),
        Role::Queen => (500, 128),
        Role::Rook => (400, 96),
        Role::Bishop => (300, 64),
        _ => return 0,
    };

    let check_squares = attacks_from(role, king_square(pos, them), occupied);

    let mut bonus = 0;
    if (attacks_from(role, to, occupied) & check_squares).any() {
        bonus += ready_check;
    }
    bonus += ring_weight * (pseudo_attacks(role, to) & ring).count() as i32;
    bonus
}

/// Try to prevent some counter-checks: penalty-free bonus for covering the
/// slider rays through our own king.
fn check_prevention_bonus(our_king: shakmaty::Square, to: shakmaty::Square) -> i32 {
    let mut bonus = 0;
    if pseudo_attacks(Role::Bishop, our_king).contains(to) {
        bonus += 128 - 32 * distance(our_king, to);
    }
    if pseudo_attacks(Role::Rook, our_king).contains(to) {
        bonus += 128 - 32 * distance(our_king, to);
    }
    bonus
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

    fn uci(m: &Move, p: &Chess) -> String {
        m.to_uci(p.castles().mode()).to_string()
    }

    #[test]
    fn ranked_list_is_sorted_descending() {
        let p = Chess::default();
        let ranked = score_and_rank_moves(&p, 0);
        assert_eq!(ranked.len(), 20);
        for w in ranked.windows(2) {
            assert!(w[0].rank >= w[1].rank);
        }
    }

    #[test]
    fn checks_rank_at_least_6000_nothing_else_does() {
        // Both Qxf7+ and Bxf7+ are available; most moves don't check
        let p = pos("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4");
        for rm in score_and_rank_moves(&p, 0) {
            let gives_check = play(&p, &rm.mv).is_check();
            assert_eq!(rm.rank >= 6000, gives_check, "move {}", uci(&rm.mv, &p));
        }
    }

    #[test]
    fn mate_in_one_is_ranked_first() {
        // Scholar's mate position: Qxf7# is the only mating move
        let p = pos("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4");
        let ranked = score_and_rank_moves(&p, 0);
        assert_eq!(uci(&ranked[0].mv, &p), "h5f7");
        assert!(ranked[0].rank > 12000, "mating move gets the 4096 boost");
    }

    #[test]
    fn capture_of_bigger_victim_ranks_higher() {
        // White rook can take a queen on a8 or a pawn on h7
        let p = pos("q6k/R6p/8/8/8/8/6P1/7K w - - 0 1");
        let ranked = score_and_rank_moves(&p, 0);
        let take_queen = ranked.iter().position(|r| uci(&r.mv, &p) == "a7a8").unwrap();
        let take_pawn = ranked.iter().position(|r| uci(&r.mv, &p) == "a7h7").unwrap();
        assert!(take_queen < take_pawn);
    }

    #[test]
    fn defender_prefers_capturing_the_checker() {
        // Black in check from a rook on e1 which the queen can capture
        let p = pos("4k3/3q4/8/8/8/8/8/4R2K b - - 0 1");
        let ranked = score_and_rank_moves(&p, 1);
        // The queen interpositions on e7/e6 outrank every king retreat
        let best = &ranked[0];
        assert_eq!(best.mv.role(), Role::Queen);
        assert!(best.rank >= 400);
        let first_retreat = ranked
            .iter()
            .position(|r| r.mv.role() == Role::King)
            .unwrap();
        assert!(first_retreat >= 2, "both interpositions come first");
    }

    #[test]
    fn root_ranker_boosts_mating_move() {
        let p = pos("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4");
        let moves = p.legal_moves();
        let mate = moves
            .iter()
            .find(|m| uci(m, &p) == "h5f7")
            .unwrap();
        let quiet = moves.iter().find(|m| uci(m, &p) == "a2a3").unwrap();
        assert!(rank_root_move(&p, mate) > rank_root_move(&p, quiet) + 8000);
    }

    #[test]
    fn root_ranker_penalizes_free_king() {
        // Ra7 confines the king to g8; Ra2 leaves it three squares
        let p = pos("7k/8/8/8/8/8/8/R5K1 w - - 0 1");
        let moves = p.legal_moves();
        let tight = moves.iter().find(|m| uci(m, &p) == "a1a7").unwrap();
        let loose = moves.iter().find(|m| uci(m, &p) == "a1a2").unwrap();
        assert!(rank_root_move(&p, tight) > rank_root_move(&p, loose));
    }
}
