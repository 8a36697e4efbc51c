//! Binary entry point for the `pointd` point-value processing service.
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pointflow::cli;
use pointflow::model::PointId;
use pointflow::time::DateTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pointd", version, about = "Point-value processing engine and historian")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Start the point-value service")]
    Run {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "NAME")]
        service: String,
    },

    #[command(about = "Query archived values for a point")]
    Query {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "UUID")]
        point: PointId,

        #[arg(long, value_name = "MICROS", default_value_t = i64::MIN)]
        from: i64,

        #[arg(long, value_name = "MICROS", default_value_t = i64::MAX)]
        to: i64,

        #[arg(long)]
        limit: Option<usize>,
    },

    #[command(about = "Purge archived values older than a stamp")]
    Purge {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "UUID")]
        point: PointId,

        #[arg(long, value_name = "MICROS")]
        before: i64,
    },

    #[command(about = "Print row-count and latest-value statistics for a point")]
    Stats {
        #[arg(long, value_name = "PATH")]
        config: PathBuf,

        #[arg(long, value_name = "UUID")]
        point: PointId,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run() -> pointflow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { config, service } => cli::run_service(&config, &service),
        Command::Query {
            config,
            point,
            from,
            to,
            limit,
        } => {
            let config = pointflow::config::Config::load(&config)?;
            let store = cli::open_store(&config)?;
            let rows = cli::query(
                &store,
                point,
                DateTime::from_micros(from),
                DateTime::from_micros(to),
                limit,
            );
            for row in rows {
                println!(
                    "{} v{} {:?}",
                    row.point_value.stamp, row.version, row.point_value.value
                );
            }
            Ok(())
        }
        Command::Purge {
            config,
            point,
            before,
        } => {
            let config = pointflow::config::Config::load(&config)?;
            let store = cli::open_store(&config)?;
            let removed = cli::purge(&store, point, DateTime::from_micros(before))?;
            println!("purged {removed} rows");
            Ok(())
        }
        Command::Stats { config, point } => {
            let config = pointflow::config::Config::load(&config)?;
            let store = cli::open_store(&config)?;
            let stats = cli::stats(&store, point);
            println!("point {} archived_rows={}", stats.point, stats.archived_rows);
            match stats.latest {
                Some(latest) => println!(
                    "  latest: stamp={} version={} value={:?}",
                    latest.point_value.stamp, latest.version, latest.point_value.value
                ),
                None => println!("  latest: none"),
            }
            Ok(())
        }
    }
}
