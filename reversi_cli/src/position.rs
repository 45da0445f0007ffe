//! Position file parsing (§6): a 2-line US-ASCII text format, entirely
//! separate from `Board::from_string`'s exact-char `Display` round-trip
//! since the file format is deliberately looser (`x`/`*` also mean black,
//! any unrecognized character means empty).

use reversi_core::board::Board;
use reversi_core::piece::Piece;
use reversi_core::square::Square;

#[derive(thiserror::Error, Debug)]
pub enum PositionError {
    #[error("position file must have at least 2 lines, found {0}")]
    TooFewLines(usize),
    #[error("board line must be exactly 64 characters, found {0}")]
    WrongBoardLength(usize),
    #[error("side-to-move line must start with B/b or W/w, found {0:?}")]
    BadSideToMove(String),
}

/// The parsed position plus which side is on move, ready to be fed into
/// [`reversi_core::solver::solve`] (which always solves from `board.player`'s
/// perspective).
pub struct Position {
    pub board: Board,
    pub side_to_move: Piece,
}

pub fn parse(text: &str) -> Result<Position, PositionError> {
    let mut lines = text.lines();
    let board_line = lines.next().ok_or(PositionError::TooFewLines(0))?;
    let side_line = lines.next().ok_or(PositionError::TooFewLines(1))?;

    let chars: Vec<char> = board_line.chars().collect();
    if chars.len() != 64 {
        return Err(PositionError::WrongBoardLength(chars.len()));
    }

    let mut black: u64 = 0;
    let mut white: u64 = 0;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            'X' | 'x' | '*' => black |= Square::from_usize_unchecked(i).bitboard(),
            'O' | 'o' => white |= Square::from_usize_unchecked(i).bitboard(),
            _ => {}
        }
    }

    let side_to_move = match side_line.chars().next() {
        Some('B') | Some('b') => Piece::Black,
        Some('W') | Some('w') => Piece::White,
        _ => return Err(PositionError::BadSideToMove(side_line.to_string())),
    };

    let board = match side_to_move {
        Piece::Black => Board::from_bitboards(black, white),
        Piece::White => Board::from_bitboards(white, black),
        Piece::Empty => unreachable!(),
    };

    Ok(Position { board, side_to_move })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_line(black: &[usize], white: &[usize]) -> String {
        let mut chars = vec!['-'; 64];
        for &i in black {
            chars[i] = 'X';
        }
        for &i in white {
            chars[i] = 'O';
        }
        chars.into_iter().collect()
    }

    #[test]
    fn parses_black_to_move() {
        let text = format!("{}\nB\n", board_line(&[0, 1], &[2]));
        let pos = parse(&text).unwrap();
        assert_eq!(pos.side_to_move, Piece::Black);
        assert_eq!(pos.board.player.count_ones(), 2);
        assert_eq!(pos.board.opponent.count_ones(), 1);
    }

    #[test]
    fn parses_white_to_move_with_lowercase_and_star() {
        let text = format!("{}\nw\n", board_line(&[0, 1, 2], &[3]));
        let pos = parse(&text).unwrap();
        assert_eq!(pos.side_to_move, Piece::White);
        // player is the side to move, so here the 1-disc side.
        assert_eq!(pos.board.player.count_ones(), 1);
        assert_eq!(pos.board.opponent.count_ones(), 3);
    }

    #[test]
    fn star_counts_as_black() {
        let line = board_line(&[], &[]).chars().enumerate().map(|(i, c)| if i == 5 { '*' } else { c }).collect::<String>();
        let text = format!("{line}\nB\n");
        let pos = parse(&text).unwrap();
        assert_eq!(pos.board.player.count_ones(), 1);
    }

    #[test]
    fn rejects_wrong_length() {
        let text = "short\nB\n";
        assert!(matches!(parse(text), Err(PositionError::WrongBoardLength(_))));
    }

    #[test]
    fn rejects_bad_side_to_move() {
        let text = format!("{}\nZ\n", board_line(&[], &[]));
        assert!(matches!(parse(&text), Err(PositionError::BadSideToMove(_))));
    }

    #[test]
    fn rejects_too_few_lines() {
        assert!(matches!(parse("onlyoneline"), Err(PositionError::TooFewLines(_))));
    }
}
