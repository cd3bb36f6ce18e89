use anyhow::{Context, Result};
use clap::{Args, Parser, ValueEnum};
use fsbencher::{
    BenchmarkDriver, FilePool, NullSink, OperationKind, ProgressSink, RunConfig, StdoutSink,
    StorageType, TracingSink, WeightSpec, WorkerSlot, get_clients,
};
use rand::random;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(value_enum, default_value = "memory")]
    storage: StorageType,

    #[arg(short = 't', default_value = "1")]
    threads: usize,

    /// Length of the timed phase in milliseconds
    #[arg(short = 'd', long, default_value = "60000")]
    duration_ms: u64,

    #[arg(long, default_value = "/fsbench")]
    base_dir: String,

    /// Directory backing the `local` storage; a temporary one if omitted
    #[arg(long)]
    root: Option<PathBuf>,

    #[arg(long, default_value = "0")]
    file_size: u64,

    #[arg(long, default_value = "0")]
    append_size: u64,

    #[arg(long, default_value = "3")]
    replication: u16,

    /// Files each worker creates before the timed phase (0 skips warm-up)
    #[arg(long, default_value = "1000")]
    warmup_files: u64,

    #[arg(long, default_value = "1000")]
    inodes_per_dir: usize,

    /// Milliseconds between progress lines
    #[arg(long, default_value = "5000")]
    progress_ms: u64,

    #[arg(long, value_enum, default_value = "stdout")]
    progress: ProgressTarget,

    /// Seed for operation selection and path picking
    #[arg(long)]
    seed: Option<u64>,

    #[command(flatten)]
    mix: MixArgs,

    /// -v info, -vv debug, -vvv trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Relative weight of each operation; need not add up to 100.
#[derive(Args)]
#[command(next_help_heading = "Operation mix")]
struct MixArgs {
    #[arg(long = "create-pct", default_value_t = 20.0)]
    create: f64,
    #[arg(long = "append-pct", default_value_t = 10.0)]
    append: f64,
    #[arg(long = "read-pct", default_value_t = 30.0)]
    read: f64,
    #[arg(long = "rename-pct", default_value_t = 5.0)]
    rename: f64,
    #[arg(long = "delete-pct", default_value_t = 5.0)]
    delete: f64,
    #[arg(long = "ls-file-pct", default_value_t = 5.0)]
    ls_file: f64,
    #[arg(long = "ls-dir-pct", default_value_t = 5.0)]
    ls_dir: f64,
    #[arg(long = "chmod-file-pct", default_value_t = 3.0)]
    chmod_file: f64,
    #[arg(long = "chmod-dir-pct", default_value_t = 2.0)]
    chmod_dir: f64,
    #[arg(long = "mkdir-pct", default_value_t = 5.0)]
    mkdir: f64,
    #[arg(long = "set-replication-pct", default_value_t = 3.0)]
    set_replication: f64,
    #[arg(long = "stat-file-pct", default_value_t = 5.0)]
    stat_file: f64,
    #[arg(long = "stat-dir-pct", default_value_t = 2.0)]
    stat_dir: f64,
}

impl MixArgs {
    fn weights(&self) -> WeightSpec {
        WeightSpec::new()
            .with(OperationKind::Create, self.create)
            .with(OperationKind::Append, self.append)
            .with(OperationKind::Read, self.read)
            .with(OperationKind::Rename, self.rename)
            .with(OperationKind::Delete, self.delete)
            .with(OperationKind::ListFile, self.ls_file)
            .with(OperationKind::ListDir, self.ls_dir)
            .with(OperationKind::ChmodFile, self.chmod_file)
            .with(OperationKind::ChmodDir, self.chmod_dir)
            .with(OperationKind::Mkdir, self.mkdir)
            .with(OperationKind::SetReplication, self.set_replication)
            .with(OperationKind::StatFile, self.stat_file)
            .with(OperationKind::StatDir, self.stat_dir)
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum ProgressTarget {
    Stdout,
    Log,
    None,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RunConfig {
        duration: Duration::from_millis(cli.duration_ms),
        concurrency: cli.threads,
        base_dir: cli.base_dir.clone(),
        file_size: cli.file_size,
        append_size: cli.append_size,
        replication: cli.replication,
        files_per_worker: cli.warmup_files,
        inodes_per_dir: cli.inodes_per_dir,
        progress_interval: Duration::from_millis(cli.progress_ms),
    };
    config.validate()?;
    let weights = cli.mix.weights();

    let seed = cli.seed.unwrap_or_else(random);
    let clients = get_clients(cli.storage, cli.root.as_deref(), config.concurrency)
        .with_context(|| format!("failed to open {:?} storage", cli.storage))?;
    let slots = clients
        .into_iter()
        .enumerate()
        .map(|(i, client)| {
            let pool = FilePool::new(
                config.worker_dir(i),
                config.inodes_per_dir,
                seed.wrapping_add(i as u64),
            );
            WorkerSlot::new(client, Box::new(pool))
        })
        .collect();
    let sink: Arc<dyn ProgressSink> = match cli.progress {
        ProgressTarget::Stdout => Arc::new(StdoutSink),
        ProgressTarget::Log => Arc::new(TracingSink),
        ProgressTarget::None => Arc::new(NullSink),
    };

    let warm_up = config.files_per_worker > 0;
    let mut driver = BenchmarkDriver::new(config, weights, slots, sink)?.with_seed(seed);
    info!("storage: {:?}, seed: {seed}", cli.storage);
    if warm_up {
        println!("{}", driver.warm_up()?);
    }
    let result = driver.run()?;
    println!("{}", result);
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    use tracing_subscriber::{EnvFilter, fmt};
    let filter = EnvFilter::new(format!("fsbencher={level}"));
    fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_mix_adds_up_to_one_hundred() {
        let cli = Cli::parse_from(["fsbencher"]);
        let weights = cli.mix.weights();
        assert_eq!(weights.total(), 100.0);
        assert_eq!(weights.iter().count(), OperationKind::COUNT);
        assert!(matches!(cli.storage, StorageType::Memory));
    }

    #[test]
    fn mix_flags_override_defaults() {
        let cli = Cli::parse_from([
            "fsbencher",
            "sled",
            "-t",
            "8",
            "--create-pct",
            "50",
            "--read-pct",
            "0",
            "-vv",
        ]);
        assert_eq!(cli.threads, 8);
        assert_eq!(cli.verbose, 2);
        let weights = cli.mix.weights();
        assert_eq!(weights.iter().next(), Some(&(OperationKind::Create, 50.0)));
        assert!(weights.iter().any(|w| *w == (OperationKind::Read, 0.0)));
    }
}
