//! The engine option set and its UCI advertisement.

use crate::search::SearchLimits;
use crate::tt::DEFAULT_TT_MB;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub hash_mb: usize,
    pub threads: usize,
    pub move_overhead_ms: u64,
    pub contempt: i32,
    pub syzygy_path: Option<String>,
    pub chess960: bool,
    pub null_move: bool,
    pub probcut: bool,
    pub singular_ext: bool,
    pub use_history: bool,
    pub large_pages: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            hash_mb: DEFAULT_TT_MB,
            threads: 1,
            move_overhead_ms: 10,
            contempt: 0,
            syzygy_path: None,
            chess960: false,
            null_move: true,
            probcut: true,
            singular_ext: true,
            use_history: true,
            large_pages: false,
        }
    }
}

/// What the UCI loop must do after an option change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionEffect {
    None,
    ResizeHash,
    SetThreads,
    ReloadTablebases,
    SetChess960,
}

fn print_spin(name: &str, default: impl std::fmt::Display, min: i64, max: i64) {
    println!("option name {name} type spin default {default} min {min} max {max}");
}

fn print_check(name: &str, default: bool) {
    println!("option name {name} type check default {default}");
}

impl EngineOptions {
    /// Advertise identity and options, ending with `uciok`.
    pub fn print_uci(&self) {
        println!("id name Aether {}", env!("CARGO_PKG_VERSION"));
        println!("id author the Aether developers");
        print_spin("Hash", self.hash_mb, 1, 65536);
        print_spin("Threads", self.threads, 1, 64);
        print_spin("MoveOverhead", self.move_overhead_ms, 0, 5000);
        print_spin("Contempt", self.contempt, -200, 200);
        println!(
            "option name SyzygyPath type string default {}",
            self.syzygy_path.as_deref().unwrap_or("<empty>")
        );
        print_check("UCI_Chess960", self.chess960);
        print_check("NullMove", self.null_move);
        print_check("ProbCut", self.probcut);
        print_check("SingularExt", self.singular_ext);
        print_check("UseHistory", self.use_history);
        print_check("LargePages", self.large_pages);
        println!("uciok");
    }

    /// Apply one `setoption`; unknown names are ignored.
    pub fn apply(&mut self, name: &str, value: Option<&str>) -> OptionEffect {
        let parse_bool = |v: Option<&str>| v.map(|s| s.eq_ignore_ascii_case("true")).unwrap_or(false);
        match name.to_ascii_lowercase().as_str() {
            "hash" => {
                if let Some(mb) = value.and_then(|v| v.parse().ok()) {
                    self.hash_mb = usize::max(mb, 1);
                    return OptionEffect::ResizeHash;
                }
            }
            "threads" => {
                if let Some(n) = value.and_then(|v| v.parse::<usize>().ok()) {
                    self.threads = n.clamp(1, 64);
                    return OptionEffect::SetThreads;
                }
            }
            "moveoverhead" => {
                if let Some(ms) = value.and_then(|v| v.parse().ok()) {
                    self.move_overhead_ms = ms;
                }
            }
            "contempt" => {
                if let Some(c) = value.and_then(|v| v.parse::<i32>().ok()) {
                    self.contempt = c.clamp(-200, 200);
                }
            }
            "syzygypath" => {
                self.syzygy_path = value
                    .filter(|v| !v.is_empty() && *v != "<empty>")
                    .map(str::to_string);
                return OptionEffect::ReloadTablebases;
            }
            "uci_chess960" => {
                self.chess960 = parse_bool(value);
                return OptionEffect::SetChess960;
            }
            "nullmove" => self.null_move = parse_bool(value),
            "probcut" => self.probcut = parse_bool(value),
            "singularext" => self.singular_ext = parse_bool(value),
            "usehistory" => self.use_history = parse_bool(value),
            "largepages" => {
                // Accepted as a hint; the allocation path is the same,
                // so the practical effect is a fresh table.
                self.large_pages = parse_bool(value);
                return OptionEffect::ResizeHash;
            }
            _ => {}
        }
        OptionEffect::None
    }

    /// Baseline limits carrying the feature gates and overhead.
    #[must_use]
    pub fn base_limits(&self) -> SearchLimits {
        SearchLimits {
            move_overhead_ms: self.move_overhead_ms,
            use_null_move: self.null_move,
            use_probcut: self.probcut,
            use_singular: self.singular_ext,
            use_history: self.use_history,
            contempt: self.contempt,
            ..SearchLimits::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_option_requests_resize() {
        let mut options = EngineOptions::default();
        assert_eq!(options.apply("Hash", Some("128")), OptionEffect::ResizeHash);
        assert_eq!(options.hash_mb, 128);
        // Zero clamps up to the minimum.
        options.apply("Hash", Some("0"));
        assert_eq!(options.hash_mb, 1);
    }

    #[test]
    fn test_option_names_are_case_insensitive() {
        let mut options = EngineOptions::default();
        options.apply("nullmove", Some("false"));
        assert!(!options.null_move);
        options.apply("NULLMOVE", Some("true"));
        assert!(options.null_move);
    }

    #[test]
    fn test_unknown_option_is_ignored() {
        let mut options = EngineOptions::default();
        assert_eq!(options.apply("FancyKnobs", Some("7")), OptionEffect::None);
    }

    #[test]
    fn test_feature_gates_reach_limits() {
        let mut options = EngineOptions::default();
        options.apply("ProbCut", Some("false"));
        options.apply("Contempt", Some("25"));
        let limits = options.base_limits();
        assert!(!limits.use_probcut);
        assert!(limits.use_null_move);
        assert_eq!(limits.contempt, 25);
    }

    #[test]
    fn test_syzygy_path_empty_marker_clears() {
        let mut options = EngineOptions::default();
        options.apply("SyzygyPath", Some("/tb/wdl"));
        assert_eq!(options.syzygy_path.as_deref(), Some("/tb/wdl"));
        options.apply("SyzygyPath", Some("<empty>"));
        assert_eq!(options.syzygy_path, None);
    }
}
