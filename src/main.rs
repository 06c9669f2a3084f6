//! Quorumsum - Command Line Interface
//!
//! Reference launcher for the quorum-paced all-reduce group.
//!
//! ## Commands
//!
//! - `master` - Run the coordinator that admits workers and paces rounds
//! - `worker` - Run a worker node that contributes a vector every round
//!
//! A minimal local group:
//!
//! ```text
//! quorumsum master --total-workers 2 &
//! quorumsum worker --port 2553 &
//! quorumsum worker --port 2554 &
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use quorumsum::{
    init_production_logging, LoggingSink, Master, MasterConfig, RandomSource, TcpTransport,
    Transport, Worker, WorkerConfig,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

/// Quorumsum - quorum-paced distributed all-reduce
#[derive(Parser, Debug)]
#[command(name = "quorumsum")]
#[command(about = "Quorum-paced, lag-tolerant distributed all-reduce", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the coordinator that admits workers and paces rounds
    Master {
        /// Host to bind and advertise (set to a routable address for
        /// multi-machine groups)
        #[arg(long, default_value = "127.0.0.1")]
        host: std::net::IpAddr,

        /// Port to listen on
        #[arg(short, long, default_value = "2551")]
        port: u16,

        /// Expected group size
        #[arg(short = 'w', long, default_value = "2")]
        total_workers: usize,

        /// Vector length; defaults to 5 elements per worker
        #[arg(short, long)]
        data_size: Option<usize>,

        /// Maximum elements per wire chunk
        #[arg(short = 'c', long, default_value = "2")]
        max_chunk_size: usize,

        /// Last round to start
        #[arg(long, default_value = "100")]
        max_round: i64,

        /// Fraction of workers required to init the group and advance rounds
        #[arg(long, default_value = "1.0")]
        th_allreduce: f64,

        /// Fraction of peers whose scatters trigger a chunk reduction
        #[arg(long, default_value = "0.9")]
        th_reduce: f64,

        /// Fraction of peers whose reduced chunks complete a round
        #[arg(long, default_value = "0.8")]
        th_complete: f64,

        /// Rounds a worker may lag behind the newest started round
        #[arg(long, default_value = "1")]
        max_lag: usize,

        /// Load settings from a TOML file (overrides the tuning flags)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },

    /// Run a worker node
    Worker {
        /// Host to bind and advertise (set to a routable address for
        /// multi-machine groups)
        #[arg(long, default_value = "127.0.0.1")]
        host: std::net::IpAddr,

        /// Port to listen on
        #[arg(short, long, default_value = "2553")]
        port: u16,

        /// Master address to register with
        #[arg(short, long, default_value = "127.0.0.1:2551")]
        master: SocketAddr,

        /// Vector length the local data source produces
        #[arg(short = 'n', long, default_value = "10")]
        source_data_size: usize,

        /// Load settings from a TOML file (overrides --master and
        /// --source-data-size)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Master {
            host,
            port,
            total_workers,
            data_size,
            max_chunk_size,
            max_round,
            th_allreduce,
            th_reduce,
            th_complete,
            max_lag,
            config,
            log_level,
        } => {
            init_production_logging(&log_level, None)?;

            let config = match config {
                Some(path) => MasterConfig::load(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => {
                    let config = MasterConfig {
                        total_workers,
                        data_size: data_size.unwrap_or(total_workers * 5),
                        max_chunk_size,
                        max_round,
                        th_allreduce,
                        th_reduce,
                        th_complete,
                        max_lag,
                    };
                    config.validate()?;
                    config
                }
            };

            cmd_master(SocketAddr::new(host, port), config).await?;
        }

        Commands::Worker {
            host,
            port,
            master,
            source_data_size,
            config,
            log_level,
        } => {
            init_production_logging(&log_level, None)?;

            let config = match config {
                Some(path) => WorkerConfig::load(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => WorkerConfig {
                    master,
                    source_data_size,
                },
            };

            cmd_worker(SocketAddr::new(host, port), config).await?;
        }
    }

    Ok(())
}

/// Run the coordinator daemon
async fn cmd_master(addr: SocketAddr, config: MasterConfig) -> Result<()> {
    println!("{}", "Quorumsum master".bold().cyan());
    println!("{}", "================".cyan());
    println!("   Group size:     {}", config.total_workers);
    println!("   Data size:      {}", config.data_size);
    println!("   Max chunk size: {}", config.max_chunk_size);
    println!("   Max round:      {}", config.max_round);
    println!(
        "   Thresholds:     allreduce {:.2} / reduce {:.2} / complete {:.2}",
        config.th_allreduce, config.th_reduce, config.th_complete
    );
    println!("   Max lag:        {}", config.max_lag);

    let (tx, rx) = mpsc::unbounded_channel();
    let transport = TcpTransport::bind(addr, tx)
        .await
        .context("Failed to bind master listener")?;

    println!("\n{} Listening on {}", "✓".green(), transport.local_addr());
    println!("   Press Ctrl+C to stop\n");
    info!(addr = %transport.local_addr(), "Master listening");

    let master = Master::new(transport.local_addr(), transport, config);
    master.run(rx).await?;

    Ok(())
}

/// Run a worker daemon
async fn cmd_worker(addr: SocketAddr, config: WorkerConfig) -> Result<()> {
    println!("{}", "Quorumsum worker".bold().cyan());
    println!("{}", "================".cyan());
    println!("   Master:         {}", config.master);
    println!("   Source size:    {}", config.source_data_size);

    let (tx, rx) = mpsc::unbounded_channel();
    let transport = TcpTransport::bind(addr, tx.clone())
        .await
        .context("Failed to bind worker listener")?;

    println!("\n{} Listening on {}", "✓".green(), transport.local_addr());

    // Gradient-like inputs for the reference launcher; swap the source and
    // sink for real workloads via the library API.
    let source = RandomSource::new(config.source_data_size, 1.0);
    let worker = Worker::new(
        transport.local_addr(),
        transport,
        tx,
        Box::new(source),
        Box::new(LoggingSink),
    );

    println!("   Node id: {}", worker.node_id());
    println!("\n{} Registering with master at {}", "→".cyan(), config.master);

    worker
        .register(config.master)
        .await
        .context("Failed to reach the master; is it running?")?;

    println!("   Waiting for group init - press Ctrl+C to stop\n");
    worker.run(rx).await?;

    Ok(())
}
