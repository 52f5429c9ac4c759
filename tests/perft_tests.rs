//! Move generator ground truth against the published perft values.

use aether::board::Position;

fn perft(fen: &str, depth: u32) -> u64 {
    Position::from_fen(fen).unwrap().perft(depth)
}

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
const POSITION_6: &str = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";

#[test]
fn perft_startpos_shallow() {
    let fen = aether::board::STARTPOS_FEN;
    assert_eq!(perft(fen, 1), 20);
    assert_eq!(perft(fen, 2), 400);
    assert_eq!(perft(fen, 3), 8902);
    assert_eq!(perft(fen, 4), 197_281);
}

#[test]
fn perft_startpos_depth_5() {
    assert_eq!(perft(aether::board::STARTPOS_FEN, 5), 4_865_609);
}

#[test]
#[ignore = "slow; run with --ignored for the full sweep"]
fn perft_startpos_depth_6() {
    assert_eq!(perft(aether::board::STARTPOS_FEN, 6), 119_060_324);
}

#[test]
fn perft_kiwipete() {
    assert_eq!(perft(KIWIPETE, 1), 48);
    assert_eq!(perft(KIWIPETE, 2), 2039);
    assert_eq!(perft(KIWIPETE, 3), 97_862);
}

#[test]
#[ignore = "slow; run with --ignored for the full sweep"]
fn perft_kiwipete_deep() {
    assert_eq!(perft(KIWIPETE, 4), 4_085_603);
    assert_eq!(perft(KIWIPETE, 5), 193_690_690);
}

#[test]
fn perft_position_3() {
    assert_eq!(perft(POSITION_3, 1), 14);
    assert_eq!(perft(POSITION_3, 2), 191);
    assert_eq!(perft(POSITION_3, 3), 2812);
    assert_eq!(perft(POSITION_3, 4), 43_238);
    assert_eq!(perft(POSITION_3, 5), 674_624);
}

#[test]
fn perft_position_4() {
    assert_eq!(perft(POSITION_4, 1), 6);
    assert_eq!(perft(POSITION_4, 2), 264);
    assert_eq!(perft(POSITION_4, 3), 9467);
    assert_eq!(perft(POSITION_4, 4), 422_333);
}

#[test]
fn perft_position_5() {
    assert_eq!(perft(POSITION_5, 1), 44);
    assert_eq!(perft(POSITION_5, 2), 1486);
    assert_eq!(perft(POSITION_5, 3), 62_379);
    assert_eq!(perft(POSITION_5, 4), 2_103_487);
}

#[test]
fn perft_position_6() {
    assert_eq!(perft(POSITION_6, 1), 46);
    assert_eq!(perft(POSITION_6, 2), 2079);
    assert_eq!(perft(POSITION_6, 3), 89_890);
}

/// Make/unmake restores the exact position at every node: implied by
/// the counts above, pinned explicitly here on a tactical position.
#[test]
fn perft_preserves_position() {
    let mut pos = Position::from_fen(KIWIPETE).unwrap();
    let fen_before = pos.to_fen();
    let key_before = pos.key();
    pos.perft(3);
    assert_eq!(pos.to_fen(), fen_before);
    assert_eq!(pos.key(), key_before);
    assert!(pos.is_consistent());
}
