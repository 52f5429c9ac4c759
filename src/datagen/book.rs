//! EPD opening book: one position per line, picked uniformly.

use std::fs;
use std::io;
use std::path::Path;

use rand::Rng;

use crate::board::Position;

pub struct OpeningBook {
    fens: Vec<String>,
}

impl OpeningBook {
    /// Load every parseable EPD/FEN line; blank lines and `#` comments
    /// are skipped, malformed lines logged and dropped.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut fens = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // EPD carries opcodes after the fourth field; the position
            // parser tolerates the tail, but validate before keeping.
            match Position::from_fen(line) {
                Ok(_) => fens.push(line.to_string()),
                Err(err) => {
                    log::warn!("{}:{}: skipping book line: {err}", path.display(), lineno + 1);
                }
            }
        }
        Ok(OpeningBook { fens })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fens.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fens.len()
    }

    /// A uniformly random book position.
    pub fn pick(&self, rng: &mut impl Rng) -> Option<Position> {
        if self.fens.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.fens.len());
        Position::from_fen(&self.fens[idx]).ok()
    }
}
