//! Genetic search CLI - run a search driven by external programs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use genetic_search::{
    schema::SearchConfig,
    search::{CancelToken, Scheduler, ScriptOperations, log_progress},
};

#[derive(Parser, Debug)]
#[command(name = "genetic-search", version)]
#[command(about = "Simple tool for running genetic search algorithm")]
#[command(long_about = "Simple tool for running genetic search algorithm.
genetic-search orchestrates the search by calling specific programs/scripts
for the required actions. Samples and results are passed as command line
arguments and read back from stdout.")]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of iterations to run [default: 1000000]
    #[arg(long = "iter")]
    iterations: Option<u64>,

    /// Total number of samples to run per iteration (random + mutated) [default: 5]
    #[arg(long = "samples")]
    total_per_iter: Option<usize>,

    /// Number of mutated samples to try and generate per iteration [default: 5]
    #[arg(long = "mut")]
    mutated_per_iter: Option<usize>,

    /// Program generating random samples [default: random.sh]
    #[arg(long = "rand")]
    random: Option<PathBuf>,

    /// Program selecting a random sample from the top samples [default: history.sh]
    #[arg(long)]
    history: Option<PathBuf>,

    /// Program taking two samples and printing a mutated one [default: mutate.sh]
    #[arg(long)]
    mutate: Option<PathBuf>,

    /// Program taking one sample and printing its result [default: test.sh]
    #[arg(long)]
    test: Option<PathBuf>,

    /// Program taking a sample and its result and storing them [default: store.sh]
    #[arg(long)]
    store: Option<PathBuf>,

    /// Worker threads [default: available parallelism]
    #[arg(long)]
    threads: Option<usize>,

    /// Log progress while running
    #[arg(long)]
    progress: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    example: bool,
}

impl Cli {
    /// Overlay flags given on the command line onto `config`.
    fn apply(self, config: &mut SearchConfig) {
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(total) = self.total_per_iter {
            config.total_per_iter = total;
        }
        if let Some(mutated) = self.mutated_per_iter {
            config.mutated_per_iter = mutated;
        }
        if let Some(threads) = self.threads {
            config.parallelism = threads;
        }
        if self.progress {
            config.show_progress = true;
        }

        let scripts = &mut config.scripts;
        if let Some(path) = self.random {
            scripts.random = path;
        }
        if let Some(path) = self.history {
            scripts.history = path;
        }
        if let Some(path) = self.mutate {
            scripts.mutate = path;
        }
        if let Some(path) = self.test {
            scripts.test = path;
        }
        if let Some(path) = self.store {
            scripts.store = path;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.example {
        print_example_config()?;
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => SearchConfig::from_json_file(path)
            .with_context(|| format!("Error loading config {}", path.display()))?,
        None => SearchConfig::default(),
    };
    cli.apply(&mut config);

    let run_config = config.run_config()?;
    let ops = ScriptOperations::new(config.scripts.clone()).into_operations();

    let mut scheduler = Scheduler::new(run_config);
    if config.show_progress {
        scheduler = scheduler.with_progress_callback(log_progress(10));
    }

    let summary = scheduler.run(&ops, &CancelToken::new())?;
    info!(
        "Done: {} iterations submitted{}",
        summary.submitted,
        if summary.cancelled { " (cancelled)" } else { "" }
    );

    Ok(())
}

fn print_example_config() -> Result<()> {
    let config = SearchConfig::default();

    println!("Example configuration (search.json):");
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
