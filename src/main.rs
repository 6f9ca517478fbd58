use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use fast_community::community_algo::ModularityEngine;
use fast_community::config::{Algorithm, RunConfig};
use fast_community::graph::GraphSnapshot;
use fast_community::logger::init_logger;
use fast_community::partition::Partition;
use fast_community::util::elapsed_ms;

/// Greedy modularity community detection on an undirected edge list.
#[derive(Debug, Parser)]
#[command(name = "fast_community", version)]
struct Cli {
    /// Edge list, one `u v` pair per line.
    edge_file: PathBuf,

    /// Yaml run config. Options given here override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    algorithm: Option<Algorithm>,

    /// Candidates in the first batched round.
    #[arg(long)]
    scope: Option<usize>,

    /// Candidates in every later batched round.
    #[arg(long)]
    subsequent_scope: Option<usize>,

    /// Binary adjacency cache, rebuilt when missing or broken.
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Where to write the partition json, stdout if absent.
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_yaml_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm;
        }
        if let Some(scope) = self.scope {
            config.initial_scope = scope;
        }
        if let Some(scope) = self.subsequent_scope {
            config.subsequent_scope = scope;
        }
        if self.cache.is_some() {
            config.cache_path = self.cache.clone();
        }
        if self.output.is_some() {
            config.output_path = self.output.clone();
        }
        if self.log_file.is_some() {
            config.log_file = self.log_file.clone();
        }
        Ok(config)
    }
}

fn write_partition(partition: &Partition, config: &RunConfig) -> Result<()> {
    match &config.output_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, partition).context("failed to write partition")?;
            writer.flush().context("failed to flush output")?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, partition).context("failed to write partition")?;
            writeln!(writer)?;
            writer.flush().context("failed to flush output")?;
        }
    }
    Ok(())
}

fn run(cli: &Cli, config: &RunConfig) -> Result<()> {
    let start = Instant::now();
    let graph = GraphSnapshot::load_or_build(&cli.edge_file, config.cache_path.as_deref())?;
    graph.validate()?;
    info!("Loaded graph: {} vertices, {} edges ({:.1} ms)",
          graph.vertex_count(), graph.edge_count(), elapsed_ms(start));

    let mut engine = ModularityEngine::from_graph(&graph)?;
    let modularity = match config.algorithm {
        Algorithm::Cnm => engine.cnm(),
        Algorithm::Cnm2 => engine.cnm2(config.initial_scope, config.subsequent_scope),
    };
    let partition = engine.into_partition(&graph);
    let summary = partition.summary();
    info!("{} communities (largest {}, singletons {}), {} merges, Q = {:.6} (recomputed {:.6}), total {:.1} ms",
          summary.community_count, summary.largest, summary.singletons,
          summary.merges, modularity, summary.partition_modularity, elapsed_ms(start));

    write_partition(&partition, config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.run_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logger(config.log_file.as_deref()) {
        eprintln!("error: {:#}", err);
        return ExitCode::FAILURE;
    }

    if let Err(err) = run(&cli, &config) {
        error!("{:#}", err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
