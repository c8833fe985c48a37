mod base_primes;
mod count;
mod errors;
mod reference;
mod storage;

use clap::{Parser, Subcommand};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "pcount")]
#[command(about = "Parallel segmented prime counting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Count primes below a given limit")]
    Count {
        #[arg(help = "The exclusive upper limit of the count")]
        limit: usize,
        #[arg(
            short,
            long,
            help = "Numbers per segment (default keeps the segment buffer cache-resident)"
        )]
        segment_size: Option<usize>,
        #[arg(short, long, help = "Number of worker threads (defaults to available CPUs)")]
        workers: Option<usize>,
        #[arg(long, help = "Recompute with the single-threaded reference sieve and compare")]
        verify: bool,
    },
    #[command(about = "Benchmark the counter over repeated timed iterations")]
    Bench {
        #[arg(help = "The exclusive upper limit of the count")]
        limit: usize,
        #[arg(short, long, default_value = "100", help = "Number of timed iterations")]
        iterations: usize,
        #[arg(long, default_value = "3", help = "Untimed warm-up runs before measuring")]
        warmup: usize,
        #[arg(short, long, help = "Numbers per segment")]
        segment_size: Option<usize>,
        #[arg(short, long, help = "Number of worker threads (defaults to available CPUs)")]
        workers: Option<usize>,
    },
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Count {
            limit,
            segment_size,
            workers,
            verify,
        } => {
            let workers = workers.unwrap_or_else(default_workers);
            let segment_size = segment_size.unwrap_or(count::DEFAULT_SEGMENT_SIZE);

            println!(
                "Counting primes below {} ({} workers, segment size {})...",
                limit, workers, segment_size
            );

            let start = Instant::now();
            let result = count::count_primes_below_with_workers(limit, segment_size, workers);
            let duration = start.elapsed();

            let found = match result {
                Ok(found) => found,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(2);
                }
            };

            let duration_us = duration.as_micros();

            println!("\nTotal: {} primes below {}", found, limit);
            println!(
                "Execution time: {}us ({:.2}ms)",
                duration_us,
                duration_us as f64 / 1000.0
            );

            if verify {
                let expected = reference::count_primes_below(limit);
                if found == expected {
                    println!("Reference sieve agrees: {} primes", expected);
                } else {
                    eprintln!(
                        "MISMATCH: reference sieve found {} primes, parallel count was {}",
                        expected, found
                    );
                    std::process::exit(1);
                }
            }

            if let Err(e) = storage::log_execution(
                "count",
                &format!("{} s={} w={}", limit, segment_size, workers),
                duration_us,
            ) {
                eprintln!("Warning: Failed to log execution: {}", e);
            }
        }
        Commands::Bench {
            limit,
            iterations,
            warmup,
            segment_size,
            workers,
        } => {
            let workers = workers.unwrap_or_else(default_workers);
            let segment_size = segment_size.unwrap_or(count::DEFAULT_SEGMENT_SIZE);

            println!(
                "Benchmarking primes below {} ({} workers, segment size {})",
                limit, workers, segment_size
            );
            println!("{} warm-up runs, {} timed iterations\n", warmup, iterations);

            let run = || count::count_primes_below_with_workers(limit, segment_size, workers);

            for _ in 0..warmup {
                if let Err(e) = run() {
                    eprintln!("Error: {}", e);
                    std::process::exit(2);
                }
            }

            let bench_start = Instant::now();
            let mut total_ms = 0.0;
            let mut found = 0;

            for i in 0..iterations {
                let start = Instant::now();
                match run() {
                    Ok(count) => found = count,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(2);
                    }
                }
                let elapsed_ms = start.elapsed().as_micros() as f64 / 1000.0;

                println!(
                    "Iteration {}: found {} primes in {:.3}ms",
                    i + 1,
                    found,
                    elapsed_ms
                );
                total_ms += elapsed_ms;
            }

            if iterations > 0 {
                println!(
                    "\nAverage execution time over {} iterations: {:.3}ms",
                    iterations,
                    total_ms / iterations as f64
                );
                println!("Total: {} primes below {}", found, limit);
            }

            if let Err(e) = storage::log_execution(
                "bench",
                &format!("{} s={} w={} iters={}", limit, segment_size, workers, iterations),
                bench_start.elapsed().as_micros(),
            ) {
                eprintln!("Warning: Failed to log execution: {}", e);
            }
        }
    }
}
