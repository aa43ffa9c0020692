//! Search configuration.
//!
//! A `SearchConfig` is settled before a search starts: the scheduling mode, and which of the
//! optional pruning policies take part. It has a compact text form, `single` or
//! `multi[:<workers>]`, optionally followed by `/` and comma separated flags, e.g.
//! `multi:8/nodedup,verify`.
use std::num::{NonZeroUsize, ParseIntError};
use thiserror::Error;

/// Scheduling mode of a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    /// One thread runs the search loop to completion.
    Single,
    /// A fixed pool of threads shares one frontier and one termination flag.
    Multi { workers: usize },
}

impl Mode {
    /// A worker pool sized to the available hardware parallelism.
    pub fn multi() -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Mode::Multi { workers }
    }

    /// Number of threads the mode runs.
    pub fn workers(&self) -> usize {
        match *self {
            Mode::Single => 1,
            Mode::Multi { workers } => workers,
        }
    }
}

/// Search configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SearchConfig {
    pub mode: Mode,
    /// Drop successors whose peg layout has been seen before.
    pub dedup: bool,
    /// Force the narrowing heuristic on or off; `None` enables it for four pegs only.
    pub narrowing: Option<bool>,
    /// Check the structural invariants of every expanded state.
    pub verify: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Single,
            dedup: true,
            narrowing: None,
            verify: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least 3 pegs are required, got {0}")]
    TooFewPegs(usize),
    #[error("at most 255 pegs are supported, got {0}")]
    TooManyPegs(usize),
    #[error("at least 1 disk is required")]
    NoDisks,
    #[error("at most 255 disks are supported, got {0}")]
    TooManyDisks(usize),
    #[error("a worker pool needs at least one worker")]
    NoWorkers,
    #[error("invalid worker count")]
    Workers(#[from] ParseIntError),
    #[error("unknown mode '{0}', expected 'single' or 'multi[:<workers>]'")]
    UnknownMode(String),
    #[error("unknown flag '{0}'")]
    UnknownFlag(String),
}

impl SearchConfig {
    /// Checks a peg count: 3..=255.
    pub fn validate_pegs(pegs: usize) -> Result<(), ConfigError> {
        if pegs < 3 {
            return Err(ConfigError::TooFewPegs(pegs));
        }
        if pegs > u8::MAX as usize {
            return Err(ConfigError::TooManyPegs(pegs));
        }
        Ok(())
    }

    /// Checks a disk count: 1..=255.
    pub fn validate_disks(disks: usize) -> Result<(), ConfigError> {
        if disks < 1 {
            return Err(ConfigError::NoDisks);
        }
        if disks > u8::MAX as usize {
            return Err(ConfigError::TooManyDisks(disks));
        }
        Ok(())
    }

    /// Checks a peg/disk count pair before anything is built for it.
    ///
    /// # Returns
    /// * `Ok(())` for 3..=255 pegs and 1..=255 disks.
    /// * `Err(ConfigError)` naming the offending count otherwise, pegs first.
    pub fn validate_counts(pegs: usize, disks: usize) -> Result<(), ConfigError> {
        Self::validate_pegs(pegs)?;
        Self::validate_disks(disks)
    }

    /// Validates this configuration for an `N`-peg, `M`-disk instance.
    pub fn validate<const N: usize, const M: usize>(&self) -> Result<(), ConfigError> {
        Self::validate_counts(N, M)?;
        if self.mode.workers() == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }

    /// Whether the narrowing heuristic takes part for `pegs` pegs.
    pub fn narrowing_for(&self, pegs: usize) -> bool {
        self.narrowing.unwrap_or(pegs == 4)
    }
}

// Parsing / printing

impl std::str::FromStr for Mode {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.split_once(':') {
            None if s == "single" => Ok(Mode::Single),
            None if s == "multi" => Ok(Mode::multi()),
            Some(("multi", workers)) => Ok(Mode::Multi {
                workers: workers.parse()?,
            }),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Mode::Single => f.write_str("single"),
            Mode::Multi { workers } => write!(f, "multi:{}", workers),
        }
    }
}

impl std::str::FromStr for SearchConfig {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        let (mode, flags) = match s.split_once('/') {
            Some((mode, flags)) => (mode, Some(flags)),
            None => (s, None),
        };
        let mut config = SearchConfig {
            mode: mode.parse()?,
            ..SearchConfig::default()
        };
        for flag in flags.into_iter().flat_map(|fs| fs.split(',')) {
            match flag {
                "nodedup" => config.dedup = false,
                "narrow" => config.narrowing = Some(true),
                "nonarrow" => config.narrowing = Some(false),
                "verify" => config.verify = true,
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
        }
        Ok(config)
    }
}

impl std::fmt::Display for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.mode)?;
        let mut flags = Vec::new();
        if !self.dedup {
            flags.push("nodedup");
        }
        match self.narrowing {
            Some(true) => flags.push("narrow"),
            Some(false) => flags.push("nonarrow"),
            None => {}
        }
        if self.verify {
            flags.push("verify");
        }
        if !flags.is_empty() {
            write!(f, "/{}", flags.join(","))?;
        }
        Ok(())
    }
}

//////////////////////////////////////////////////////////////////////////////////////////
