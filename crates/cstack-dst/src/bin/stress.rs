//! cstack-stress: hammer a `ConcurrentStack` from many threads.
//!
//! ```bash
//! cstack-stress --producers 8 --consumers 4 --pushes 10000
//! cstack-stress --overlap --rounds 20 --json
//! ```
//!
//! Exits 1 if any round loses, duplicates, or fabricates a value, and 2 on
//! invalid arguments.

use std::process;

use clap::Parser;

use cstack_dst::{init_tracing, run_stress, StressConfig, StressReport};

/// Stress-test the mutex-guarded concurrent stack.
#[derive(Parser, Debug)]
#[command(name = "cstack-stress")]
#[command(about = "Concurrent push/pop stress test for cstack")]
struct Cli {
    /// Number of producer threads.
    #[arg(long, default_value_t = StressConfig::PRODUCERS_DEFAULT)]
    producers: usize,

    /// Number of consumer threads.
    #[arg(long, default_value_t = StressConfig::CONSUMERS_DEFAULT)]
    consumers: usize,

    /// Values pushed by each producer.
    #[arg(long, default_value_t = StressConfig::PUSHES_DEFAULT)]
    pushes: u64,

    /// Start consumers while producers are still pushing.
    #[arg(long)]
    overlap: bool,

    /// Number of times to repeat the run.
    #[arg(long, default_value_t = 1)]
    rounds: u32,

    /// Print one JSON report per line instead of text.
    #[arg(long)]
    json: bool,
}

fn print_report(report: &StressReport, json: bool) {
    if !json {
        println!("{}", report);
        return;
    }
    match serde_json::to_string(report) {
        Ok(line) => println!("{}", line),
        Err(e) => {
            eprintln!("error: failed to serialize report: {}", e);
            process::exit(2);
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = StressConfig {
        producers: cli.producers,
        consumers: cli.consumers,
        pushes_per_producer: cli.pushes,
        overlap: cli.overlap,
    };
    if let Err(e) = config.validate() {
        eprintln!("error: {}", e);
        process::exit(2);
    }

    let mut failures = 0u32;
    for _ in 0..cli.rounds {
        let report = run_stress(&config);
        if !report.is_clean() {
            failures += 1;
        }
        print_report(&report, cli.json);
    }

    if failures > 0 {
        eprintln!("{} of {} round(s) failed", failures, cli.rounds);
        process::exit(1);
    }
}
