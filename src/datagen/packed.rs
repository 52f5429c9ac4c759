//! Packed training-record formats.
//!
//! V1 is a bare stream of 32-byte little-endian records. V2 prepends an
//! 8-byte file header (magic "AETH") and extends each record with the
//! search depth, the best move, and optionally the game ply. Readers
//! auto-detect the format from the header.

use std::fmt;
use std::io::{self, Read, Write};

use crate::board::{Bitboard, Color, Move, Piece, Position, Square};

pub const MAGIC: [u8; 4] = *b"AETH";
pub const VERSION_V2: u8 = 2;
pub const FLAG_HAS_PLY: u8 = 0x01;
pub const ENDIAN_LITTLE: u8 = 1;

const STM_BIT: u8 = 0x80;
const EP_MASK: u8 = 0x7F;
const EP_NONE: u8 = 64;

pub const V1_RECORD_SIZE: usize = 32;
pub const V2_RECORD_SIZE: usize = 37;
pub const V2_RECORD_SIZE_NO_PLY: usize = 35;
pub const HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedFormat {
    V1,
    V2,
}

#[derive(Debug)]
pub enum RecordError {
    Io(io::Error),
    UnsupportedVersion(u8),
    EndiannessMismatch,
    /// Forced format disagreed with what the file actually contains.
    FormatMismatch(&'static str),
    TruncatedRecord,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Io(err) => write!(f, "i/o error: {err}"),
            RecordError::UnsupportedVersion(v) => write!(f, "unsupported record version {v}"),
            RecordError::EndiannessMismatch => write!(f, "record file endianness mismatch"),
            RecordError::FormatMismatch(what) => write!(f, "format mismatch: {what}"),
            RecordError::TruncatedRecord => write!(f, "truncated record"),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<io::Error> for RecordError {
    fn from(err: io::Error) -> Self {
        RecordError::Io(err)
    }
}

/// In-memory record: the V2 superset. V1 writers simply drop the tail
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRecord {
    pub occupancy: u64,
    /// One nibble per occupied square in lsb-first order:
    /// (piece_type + 1) | (color << 3).
    pub pieces: [u8; 16],
    /// Black-to-move bit (0x80) | en passant square (64 = none).
    pub stm_ep: u8,
    pub halfmove: u8,
    pub fullmove: u16,
    /// Side-to-move-relative score, saturated at +/-2000.
    pub score_cp: i16,
    /// 0 = loss, 1 = draw, 2 = win for the side to move (from eval).
    pub wdl: u8,
    /// Same encoding, from the actual game outcome.
    pub result: u8,
    pub depth_reached: u8,
    pub bestmove: u16,
    pub ply: u16,
}

fn encode_piece(color: Color, piece: Piece) -> u8 {
    ((piece.index() + 1) | (color.index() << 3)) as u8
}

fn decode_piece(nibble: u8) -> Option<(Color, Piece)> {
    let type_bits = (nibble & 0x7) as usize;
    if type_bits == 0 || type_bits > 6 {
        return None;
    }
    let color = Color::from_index(((nibble >> 3) & 1) as usize);
    Some((color, Piece::from_index(type_bits - 1)))
}

impl PackedRecord {
    /// Capture a position with its search outcome.
    #[must_use]
    pub fn from_position(
        pos: &Position,
        score_cp: i16,
        wdl: u8,
        depth_reached: u8,
        bestmove: Move,
        ply: u16,
    ) -> Self {
        let occupancy = pos.occupied();
        let mut pieces = [0u8; 16];
        for (idx, sq) in occupancy.into_iter().enumerate() {
            let (color, piece) = pos.piece_at(sq).expect("occupancy bit without piece");
            let nibble = encode_piece(color, piece);
            if idx % 2 == 0 {
                pieces[idx / 2] = nibble;
            } else {
                pieces[idx / 2] |= nibble << 4;
            }
        }

        let stm_bit = if pos.side_to_move() == Color::Black {
            STM_BIT
        } else {
            0
        };
        let ep = pos
            .ep_square()
            .map_or(EP_NONE, |sq| sq.index() as u8);

        PackedRecord {
            occupancy: occupancy.0,
            pieces,
            stm_ep: stm_bit | (ep & EP_MASK),
            halfmove: pos.rule50().min(255) as u8,
            fullmove: pos.fullmove().min(65535) as u16,
            score_cp,
            wdl,
            result: 1,
            depth_reached,
            bestmove: bestmove.as_u16(),
            ply,
        }
    }

    #[must_use]
    pub fn side_to_move(&self) -> Color {
        if self.stm_ep & STM_BIT != 0 {
            Color::Black
        } else {
            Color::White
        }
    }

    #[must_use]
    pub fn ep_square(&self) -> Option<Square> {
        let ep = self.stm_ep & EP_MASK;
        if ep >= 64 {
            None
        } else {
            Some(Square::from_index(ep as usize))
        }
    }

    /// Stamp the finished game's outcome (white perspective: 1.0 win,
    /// 0.5 draw, 0.0 loss) into this record, relative to its side to
    /// move.
    pub fn set_result(&mut self, game_result: f32) {
        let black = self.side_to_move() == Color::Black;
        self.result = if game_result > 0.9 {
            if black {
                0
            } else {
                2
            }
        } else if game_result < 0.1 {
            if black {
                2
            } else {
                0
            }
        } else {
            1
        };
    }

    /// Rebuild the position. Castling rights are not part of the packed
    /// format, so the result carries none.
    #[must_use]
    pub fn unpack_position(&self) -> Option<Position> {
        let mut pos = Position::empty();
        for (idx, sq) in Bitboard(self.occupancy).into_iter().enumerate() {
            let byte = self.pieces[idx / 2];
            let nibble = if idx % 2 == 0 { byte & 0xF } else { byte >> 4 };
            let (color, piece) = decode_piece(nibble)?;
            pos.put_piece(sq, color, piece);
        }
        pos.set_state_fields(
            self.side_to_move(),
            crate::board::CastlingRights::NONE,
            self.ep_square(),
            u32::from(self.halfmove),
            u32::from(self.fullmove),
        );
        Some(pos)
    }

    fn write_common(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.occupancy.to_le_bytes());
        buf.extend_from_slice(&self.pieces);
        buf.push(self.stm_ep);
        buf.push(self.halfmove);
        buf.extend_from_slice(&self.fullmove.to_le_bytes());
        buf.extend_from_slice(&self.score_cp.to_le_bytes());
        buf.push(self.wdl);
        buf.push(self.result);
    }

    pub fn write_v1(&self, out: &mut impl Write) -> io::Result<()> {
        let mut buf = Vec::with_capacity(V1_RECORD_SIZE);
        self.write_common(&mut buf);
        buf.push(0); // pad
        debug_assert_eq!(buf.len(), V1_RECORD_SIZE);
        out.write_all(&buf)
    }

    pub fn write_v2(&self, out: &mut impl Write, has_ply: bool) -> io::Result<()> {
        let mut buf = Vec::with_capacity(V2_RECORD_SIZE);
        self.write_common(&mut buf);
        buf.push(self.depth_reached);
        buf.extend_from_slice(&self.bestmove.to_le_bytes());
        if has_ply {
            buf.extend_from_slice(&self.ply.to_le_bytes());
        }
        debug_assert_eq!(
            buf.len(),
            if has_ply { V2_RECORD_SIZE } else { V2_RECORD_SIZE_NO_PLY }
        );
        out.write_all(&buf)
    }

    fn from_bytes(buf: &[u8], format: PackedFormat, has_ply: bool) -> PackedRecord {
        let mut record = PackedRecord {
            occupancy: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            pieces: buf[8..24].try_into().unwrap(),
            stm_ep: buf[24],
            halfmove: buf[25],
            fullmove: u16::from_le_bytes(buf[26..28].try_into().unwrap()),
            score_cp: i16::from_le_bytes(buf[28..30].try_into().unwrap()),
            wdl: buf[30],
            result: buf[31],
            depth_reached: 0,
            bestmove: 0,
            ply: 0,
        };
        if format == PackedFormat::V2 {
            record.depth_reached = buf[32];
            record.bestmove = u16::from_le_bytes(buf[33..35].try_into().unwrap());
            if has_ply {
                record.ply = u16::from_le_bytes(buf[35..37].try_into().unwrap());
            }
        }
        record
    }
}

/// File header for V2 streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u8,
    pub flags: u8,
    pub endianness: u8,
}

impl FileHeader {
    #[must_use]
    pub fn v2(has_ply: bool) -> Self {
        FileHeader {
            version: VERSION_V2,
            flags: if has_ply { FLAG_HAS_PLY } else { 0 },
            endianness: ENDIAN_LITTLE,
        }
    }

    pub fn write(&self, out: &mut impl Write) -> io::Result<()> {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = self.version;
        buf[5] = self.flags;
        buf[6] = self.endianness;
        buf[7] = 0; // reserved
        out.write_all(&buf)
    }

    #[must_use]
    pub fn has_ply(&self) -> bool {
        self.flags & FLAG_HAS_PLY != 0
    }
}

/// Streaming writer: writes the V2 header up front when asked for V2.
pub struct RecordWriter<W: Write> {
    out: W,
    format: PackedFormat,
    has_ply: bool,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(mut out: W, format: PackedFormat, has_ply: bool) -> Result<Self, RecordError> {
        if format == PackedFormat::V2 {
            FileHeader::v2(has_ply).write(&mut out)?;
        }
        Ok(RecordWriter {
            out,
            format,
            has_ply,
        })
    }

    pub fn write(&mut self, record: &PackedRecord) -> Result<(), RecordError> {
        match self.format {
            PackedFormat::V1 => record.write_v1(&mut self.out)?,
            PackedFormat::V2 => record.write_v2(&mut self.out, self.has_ply)?,
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RecordError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Streaming reader with header auto-detection. A forced format that
/// contradicts the stream is an error, not a guess.
pub struct RecordReader<R: Read> {
    input: R,
    format: PackedFormat,
    has_ply: bool,
    record_size: usize,
    pending: Vec<u8>,
}

impl<R: Read> RecordReader<R> {
    pub fn new(mut input: R, forced: Option<PackedFormat>) -> Result<Self, RecordError> {
        let mut head = [0u8; HEADER_SIZE];
        let got = read_up_to(&mut input, &mut head)?;

        let has_header = got == HEADER_SIZE && head[0..4] == MAGIC;
        match (forced, has_header) {
            (Some(PackedFormat::V2), false) => {
                return Err(RecordError::FormatMismatch("expected v2 header, found none"))
            }
            (Some(PackedFormat::V1), true) => {
                return Err(RecordError::FormatMismatch("v1 requested but file has a v2 header"))
            }
            _ => {}
        }

        if has_header {
            let header = FileHeader {
                version: head[4],
                flags: head[5],
                endianness: head[6],
            };
            if header.version != VERSION_V2 {
                return Err(RecordError::UnsupportedVersion(header.version));
            }
            if header.endianness != ENDIAN_LITTLE {
                return Err(RecordError::EndiannessMismatch);
            }
            let has_ply = header.has_ply();
            Ok(RecordReader {
                input,
                format: PackedFormat::V2,
                has_ply,
                record_size: if has_ply { V2_RECORD_SIZE } else { V2_RECORD_SIZE_NO_PLY },
                pending: Vec::new(),
            })
        } else {
            Ok(RecordReader {
                input,
                format: PackedFormat::V1,
                has_ply: false,
                record_size: V1_RECORD_SIZE,
                pending: head[..got].to_vec(),
            })
        }
    }

    #[must_use]
    pub fn format(&self) -> PackedFormat {
        self.format
    }

    #[must_use]
    pub fn has_ply(&self) -> bool {
        self.has_ply
    }

    /// Next record, `Ok(None)` at a clean end of stream.
    pub fn next_record(&mut self) -> Result<Option<PackedRecord>, RecordError> {
        let mut buf = vec![0u8; self.record_size];
        let reused = self.pending.len();
        buf[..reused].copy_from_slice(&self.pending);
        self.pending.clear();

        let got = read_up_to(&mut self.input, &mut buf[reused..])? + reused;
        if got == 0 {
            return Ok(None);
        }
        if got < self.record_size {
            return Err(RecordError::TruncatedRecord);
        }
        Ok(Some(PackedRecord::from_bytes(
            &buf,
            self.format,
            self.has_ply,
        )))
    }
}

fn read_up_to(input: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match input.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_record(fen: &str, score: i16) -> PackedRecord {
        let pos = Position::from_fen(fen).unwrap();
        PackedRecord::from_position(&pos, score, 1, 9, Move::null(), 17)
    }

    #[test]
    fn test_v1_record_is_32_bytes() {
        let record = sample_record(crate::board::STARTPOS_FEN, 13);
        let mut buf = Vec::new();
        record.write_v1(&mut buf).unwrap();
        assert_eq!(buf.len(), V1_RECORD_SIZE);
    }

    #[test]
    fn test_v2_record_sizes() {
        let record = sample_record(crate::board::STARTPOS_FEN, 13);
        let mut with_ply = Vec::new();
        record.write_v2(&mut with_ply, true).unwrap();
        assert_eq!(with_ply.len(), V2_RECORD_SIZE);
        let mut without = Vec::new();
        record.write_v2(&mut without, false).unwrap();
        assert_eq!(without.len(), V2_RECORD_SIZE_NO_PLY);
    }

    #[test]
    fn test_position_roundtrip_through_v2() {
        let fens = [
            crate::board::STARTPOS_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R b KQkq - 3 9",
            "4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 42",
        ];
        for fen in fens {
            let pos = Position::from_fen(fen).unwrap();
            let record = PackedRecord::from_position(&pos, -123, 0, 11, Move::null(), 5);

            let mut buf = Vec::new();
            let mut writer = RecordWriter::new(&mut buf, PackedFormat::V2, true).unwrap();
            writer.write(&record).unwrap();

            let mut reader = RecordReader::new(Cursor::new(buf), None).unwrap();
            assert_eq!(reader.format(), PackedFormat::V2);
            assert!(reader.has_ply());
            let back = reader.next_record().unwrap().unwrap();
            assert_eq!(back, record);

            let unpacked = back.unpack_position().unwrap();
            assert_eq!(unpacked.side_to_move(), pos.side_to_move());
            assert_eq!(unpacked.occupied(), pos.occupied());
            assert_eq!(unpacked.ep_square(), pos.ep_square());
            assert_eq!(unpacked.rule50(), pos.rule50());
            for sq in pos.occupied() {
                assert_eq!(unpacked.piece_at(sq), pos.piece_at(sq), "square {sq}");
            }
            assert!(reader.next_record().unwrap().is_none());
        }
    }

    #[test]
    fn test_headerless_stream_reads_as_v1() {
        let record = sample_record(crate::board::STARTPOS_FEN, 55);
        let mut buf = Vec::new();
        let mut writer = RecordWriter::new(&mut buf, PackedFormat::V1, false).unwrap();
        writer.write(&record).unwrap();
        writer.write(&record).unwrap();

        let mut reader = RecordReader::new(Cursor::new(buf), None).unwrap();
        assert_eq!(reader.format(), PackedFormat::V1);
        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.score_cp, 55);
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_forced_format_mismatch_is_rejected() {
        let record = sample_record(crate::board::STARTPOS_FEN, 0);
        let mut v2 = Vec::new();
        RecordWriter::new(&mut v2, PackedFormat::V2, true)
            .unwrap()
            .write(&record)
            .unwrap();
        assert!(matches!(
            RecordReader::new(Cursor::new(v2), Some(PackedFormat::V1)),
            Err(RecordError::FormatMismatch(_))
        ));

        let mut v1 = Vec::new();
        RecordWriter::new(&mut v1, PackedFormat::V1, false)
            .unwrap()
            .write(&record)
            .unwrap();
        assert!(matches!(
            RecordReader::new(Cursor::new(v1), Some(PackedFormat::V2)),
            Err(RecordError::FormatMismatch(_))
        ));
    }

    #[test]
    fn test_truncated_record_is_an_error() {
        let record = sample_record(crate::board::STARTPOS_FEN, 0);
        let mut buf = Vec::new();
        record.write_v1(&mut buf).unwrap();
        buf.truncate(20);
        let mut reader = RecordReader::new(Cursor::new(buf), None).unwrap();
        assert!(matches!(
            reader.next_record(),
            Err(RecordError::TruncatedRecord)
        ));
    }

    #[test]
    fn test_result_stamping_is_stm_relative() {
        let white_to_move = sample_record(crate::board::STARTPOS_FEN, 0);
        let mut record = white_to_move;
        record.set_result(1.0);
        assert_eq!(record.result, 2);
        record.set_result(0.0);
        assert_eq!(record.result, 0);
        record.set_result(0.5);
        assert_eq!(record.result, 1);

        let mut black = sample_record(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
            0,
        );
        black.set_result(1.0);
        assert_eq!(black.result, 0, "white win is a loss for black-to-move");
    }
}
