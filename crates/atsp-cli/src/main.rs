mod logging;

use std::{
    io::{self, Write},
    net::TcpListener,
    path::PathBuf,
    time::Duration,
};

use anyhow::{ensure, Context, Result};
use atsp_bnb::{run_process, solve, solve_cluster, SearchConfig, SearchReport, TcpTransport};
use atsp_core::{Cost, CostMatrix};
use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "atsp", version, about = "Exact asymmetric TSP by parallel branch and bound")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Solve a matrix in this process, optionally simulating several processes
    Solve {
        #[command(flatten)]
        search: SearchArgs,
        /// Number of in-process simulated processes
        #[arg(long, default_value_t = 1)]
        procs: usize,
    },
    /// Run one process of a TCP cluster. Rank 0 listens on ADDR, the others connect to it
    Node {
        #[arg(long)]
        rank: usize,
        #[arg(long)]
        size: usize,
        #[arg(long)]
        addr: String,
        /// Seconds a non-root rank keeps retrying to reach rank 0
        #[arg(long, default_value_t = 30)]
        connect_timeout: u64,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Print a random matrix in the loader's text format
    Generate {
        #[arg(long)]
        cities: usize,
        #[arg(long, default_value_t = 100)]
        max_cost: Cost,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Worker threads per process
    threads: usize,
    /// Cost matrix file
    matrix: PathBuf,
    /// Smallest stack a worker will split for an idle sibling
    min_split: usize,
    /// Tours per search stack, 2·n² when omitted
    #[arg(long)]
    stack_capacity: Option<usize>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl SearchArgs {
    fn load(&self) -> Result<(CostMatrix, SearchConfig)> {
        let matrix = CostMatrix::load(&self.matrix)
            .with_context(|| format!("failed to load {}", self.matrix.display()))?;
        let mut config = SearchConfig::new(self.threads, self.min_split);
        config.stack_capacity = self.stack_capacity;
        config.validate()?;
        log::info!("loaded {}: {} cities", self.matrix.display(), matrix.cities());
        Ok((matrix, config))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose)?;

    match cli.command {
        Command::Solve { search, procs } => {
            ensure!(procs > 0, "--procs must be positive");
            let (matrix, config) = search.load()?;
            let report = if procs == 1 {
                solve(&matrix, &config)?
            } else {
                solve_cluster(&matrix, &config, procs)?
                    .into_iter()
                    .next()
                    .context("cluster returned no reports")?
            };
            print_report(&report, search.json)
        }
        Command::Node {
            rank,
            size,
            addr,
            connect_timeout,
            search,
        } => {
            ensure!(size > 0, "--size must be positive");
            ensure!(rank < size, "--rank must be below --size");
            let (matrix, config) = search.load()?;
            let transport = if rank == 0 {
                let listener =
                    TcpListener::bind(&addr).with_context(|| format!("failed to bind {addr}"))?;
                TcpTransport::bind_root(listener, size)?
            } else {
                TcpTransport::connect(
                    addr.as_str(),
                    rank,
                    size,
                    Duration::from_secs(connect_timeout),
                )
                .with_context(|| format!("failed to reach rank 0 at {addr}"))?
            };
            let report = run_process(&matrix, &config, &transport)?;
            if rank == 0 {
                print_report(&report, search.json)?;
            }
            Ok(())
        }
        Command::Generate {
            cities,
            max_cost,
            seed,
        } => {
            let seed = seed.unwrap_or_else(rand::random);
            log::info!("generating {cities} cities with seed {seed}");
            let matrix = CostMatrix::random(cities, max_cost, seed)?;
            matrix.write_to(io::stdout().lock())?;
            Ok(())
        }
    }
}

fn print_report(report: &SearchReport, json: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, report)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{report}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn solve_takes_the_three_launch_parameters() {
        let cli = Cli::try_parse_from(["atsp", "-vv", "solve", "4", "m.txt", "2", "--procs", "3"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Solve { search, procs } = cli.command else {
            panic!("expected solve");
        };
        assert_eq!(procs, 3);
        assert_eq!(search.threads, 4);
        assert_eq!(search.matrix, PathBuf::from("m.txt"));
        assert_eq!(search.min_split, 2);
        assert!(!search.json);
    }

    #[test]
    fn node_requires_rank_size_and_addr() {
        assert!(Cli::try_parse_from(["atsp", "node", "2", "m.txt", "2"]).is_err());
        let cli = Cli::try_parse_from([
            "atsp", "node", "--rank", "1", "--size", "2", "--addr", "127.0.0.1:7000", "2",
            "m.txt", "2", "--json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Node { rank: 1, size: 2, ref search, .. } if search.json
        ));
    }
}
