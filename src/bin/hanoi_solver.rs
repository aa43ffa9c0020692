use clap::{Parser, ValueEnum};
use hanoi_solver::config::{ConfigError, Mode, SearchConfig};
use hanoi_solver::solver::{SearchError, SearchOutcome};
use hanoi_solver::utils::frame_stewart;
use std::io::Write as _;
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Schedule {
    Single,
    Multi,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum NarrowingArg {
    Auto,
    On,
    Off,
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Run the search on one thread or on a worker pool
    #[clap(short, long, value_enum, default_value_t = Schedule::Single)]
    mode: Schedule,

    /// Number of workers in multi mode (defaults to the available parallelism)
    #[clap(short, long)]
    workers: Option<usize>,

    /// Keep successors whose peg layout was already seen
    #[clap(long)]
    no_dedup: bool,

    /// Narrowing heuristic; `auto` enables it for 4 pegs
    #[clap(long, value_enum, default_value_t = NarrowingArg::Auto)]
    narrowing: NarrowingArg,

    /// Check the invariants of every expanded state
    #[clap(long)]
    verify: bool,

    /// Whole configuration in compact form (e.g. `multi:8/nodedup`), replacing the flags above
    #[clap(long)]
    config: Option<SearchConfig>,

    /// Only run instances with this many pegs
    #[clap(short, long)]
    pegs: Option<usize>,

    /// Only run instances with this many disks
    #[clap(short, long)]
    disks: Option<usize>,
}

impl Args {
    fn search_config(&self) -> SearchConfig {
        if let Some(config) = self.config {
            return config;
        }
        let mode = match (self.mode, self.workers) {
            (Schedule::Single, _) => Mode::Single,
            (Schedule::Multi, Some(workers)) => Mode::Multi { workers },
            (Schedule::Multi, None) => Mode::multi(),
        };
        SearchConfig {
            mode,
            dedup: !self.no_dedup,
            narrowing: match self.narrowing {
                NarrowingArg::Auto => None,
                NarrowingArg::On => Some(true),
                NarrowingArg::Off => Some(false),
            },
            verify: self.verify,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid instance filter")]
    Filter(#[from] ConfigError),
    #[error("no built-in instance matches the filter")]
    NoInstance,
    #[error("search failed for N={pegs} M={disks}")]
    Search {
        pegs: usize,
        disks: usize,
        #[source]
        source: SearchError,
    },
}

type SolveFn = fn(&SearchConfig) -> Result<SearchOutcome, SearchError>;

/// A compiled instance; peg and disk counts are fixed at build time.
struct Instance {
    pegs: usize,
    disks: usize,
    solve: SolveFn,
}

macro_rules! instances {
    ($(($n:literal, $m:literal)),* $(,)?) => {
        &[$(Instance {
            pegs: $n,
            disks: $m,
            solve: hanoi_solver::solve::<$n, $m>,
        }),*]
    };
}

const INSTANCES: &[Instance] = instances![
    (3, 3),
    (3, 10),
    (4, 5),
    (4, 8),
    (4, 10),
    (5, 8),
    (6, 8),
];

fn main() {
    env_logger::builder()
        .format(|f, rec| writeln!(f, "{}: {}", rec.level(), rec.args()))
        .target(env_logger::Target::Stderr)
        .init();

    let args = Args::parse();
    std::process::exit(match run(&args) {
        Ok(()) => 0,
        Err(err) => {
            display_error(&err);
            1
        }
    })
}

fn run(args: &Args) -> Result<(), CliError> {
    if let Some(pegs) = args.pegs {
        SearchConfig::validate_pegs(pegs)?;
    }
    if let Some(disks) = args.disks {
        SearchConfig::validate_disks(disks)?;
    }

    let config = args.search_config();
    let selected: Vec<&Instance> = INSTANCES
        .iter()
        .filter(|i| args.pegs.map_or(true, |p| p == i.pegs))
        .filter(|i| args.disks.map_or(true, |d| d == i.disks))
        .collect();
    if selected.is_empty() {
        return Err(CliError::NoInstance);
    }

    for instance in selected {
        println!("{}", "-".repeat(30));
        println!("N: {} M: {}", instance.pegs, instance.disks);
        println!("{}", "-".repeat(30));
        let outcome = (instance.solve)(&config).map_err(|source| CliError::Search {
            pegs: instance.pegs,
            disks: instance.disks,
            source,
        })?;
        println!(
            "Moves: {} (Frame-Stewart: {})",
            outcome.moves,
            frame_stewart(instance.pegs, instance.disks)
        );
        println!("States expanded: {}", outcome.expanded);
        println!("Time execution: {}s", outcome.elapsed.as_secs_f64());
    }
    Ok(())
}

fn display_error(mut err: &dyn std::error::Error) {
    loop {
        log::error!("{}", err);
        if let Some(src) = err.source() {
            err = src;
        } else {
            break;
        }
    }
}
