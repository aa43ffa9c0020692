use hanoi_solver::config::{Mode, SearchConfig};
use hanoi_solver::frontier::LevelQueue;
use hanoi_solver::heuristics::{
    BasicMoves, Chain, FingerprintMemo, MoveGenerator, Narrowing, PruningPolicy, ShuffledMoves,
};
use hanoi_solver::solver::{Search, SearchError, SearchOutcome};
use hanoi_solver::utils::frame_stewart;
use std::collections::HashMap;
use std::io::Write as _;
use std::time::Duration;

const SHUFFLE_SEED: u64 = 0;

const COMBINATIONS: [&str; 4] = ["MEMO", "NARROW+MEMO", "SHUFFLED+MEMO", "MULTI+MEMO"];

fn run_combination<const N: usize, const M: usize, G, P>(
    generator: &G,
    policy: &P,
    config: SearchConfig,
) -> Result<SearchOutcome, SearchError>
where
    G: MoveGenerator<N, M>,
    P: PruningPolicy<N, M>,
{
    let frontier = LevelQueue::new();
    Search::<N, M, _, _, _>::new(&frontier, generator, policy, config).run()
}

/// Runs every combination on one instance and adds the times to `totals`.
fn evaluate<const N: usize, const M: usize>(
    totals: &mut HashMap<&'static str, Duration>,
) -> Result<(), SearchError> {
    let reference = frame_stewart(N, M);
    println!("\nEvaluating N={} M={} (Frame-Stewart: {})", N, M, reference);

    let single = SearchConfig::default();
    let multi = SearchConfig {
        mode: Mode::multi(),
        ..single
    };
    let outcomes = [
        run_combination::<N, M, _, _>(&BasicMoves, &FingerprintMemo::new(), single)?,
        run_combination::<N, M, _, _>(
            &BasicMoves,
            &Chain(Narrowing::for_disks(M), FingerprintMemo::new()),
            single,
        )?,
        run_combination::<N, M, _, _>(
            &ShuffledMoves { seed: SHUFFLE_SEED },
            &FingerprintMemo::new(),
            single,
        )?,
        run_combination::<N, M, _, _>(&BasicMoves, &FingerprintMemo::new(), multi)?,
    ];

    for (name, outcome) in COMBINATIONS.iter().zip(&outcomes) {
        let marker = if outcome.moves as u64 == reference { "" } else { " (!)" };
        println!(
            "  Combination: {:<14}, Moves: {:<4}, Expanded: {:<9}, Time: {:.3}s{}",
            name,
            outcome.moves,
            outcome.expanded,
            outcome.elapsed.as_secs_f64(),
            marker
        );
        *totals.entry(*name).or_default() += outcome.elapsed;
    }
    Ok(())
}

fn main() {
    env_logger::builder()
        .format(|f, rec| writeln!(f, "{}: {}", rec.level(), rec.args()))
        .target(env_logger::Target::Stderr)
        .init();

    println!("Starting policy evaluation...");

    let mut totals = HashMap::new();
    let result = evaluate::<3, 6>(&mut totals)
        .and_then(|()| evaluate::<4, 6>(&mut totals))
        .and_then(|()| evaluate::<4, 8>(&mut totals))
        .and_then(|()| evaluate::<5, 6>(&mut totals))
        .and_then(|()| evaluate::<5, 8>(&mut totals));
    if let Err(err) = result {
        display_error(&err);
        std::process::exit(1);
    }

    println!("\n--- Evaluation Complete ---");
    println!("Combinations evaluated: {}", COMBINATIONS.join(", "));
    println!("\n--- Total Times ---");

    let mut sorted_totals: Vec<(&str, Duration)> = totals.into_iter().collect();
    sorted_totals.sort_by_key(|&(_, total)| total);
    for (name, total) in sorted_totals {
        println!("Combination {:<14}: Total Time = {:.3}s", name, total.as_secs_f64());
    }
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
