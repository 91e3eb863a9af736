use clap::{Parser, Subcommand};
use common::{
    combine::combine_counts,
    extract::{block_averages, operation_sums},
    reshape::{Mode, Unit, accumulate, reshape},
};
use eyre::{Context, Result};
use tokio::fs::read_to_string;
use tracing::error;
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reshape per-client read/decrypt measurements
    Clients {
        /// Measurement CSV from a simulation run
        file: String,
        /// Match user-time columns instead of wall-clock
        #[arg(long, default_value_t = false)]
        user: bool,
        /// Pass the _avg values through without summing
        #[arg(long, default_value_t = false, conflicts_with = "accumulate")]
        plain: bool,
        /// One wide output row per client instead of one per round
        #[arg(long, default_value_t = false)]
        accumulate: bool,
        /// Fail on columns with an unrecognized measurement kind
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
    /// Per-block wall-clock averages from the first measurement row
    Blocks {
        /// Measurement CSV from a simulation run
        file: String,
    },
    /// Decrypt and write-proof totals from the first measurement row
    Totals {
        /// Measurement CSV from a simulation run
        file: String,
    },
    /// Merge per-block times with write/read transaction counts
    Combine {
        /// Parsed block,time file
        times_file: String,
        /// write,read counts file
        counts_file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new(format!("plot_data={log_level},common={log_level}"));
    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(layer().with_writer(non_blocking))
        .init();

    if let Err(err) = run(args.command).await {
        error!("{err:#?}");
        return Err(err);
    }
    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    let lines = match command {
        Commands::Clients {
            file,
            user,
            plain,
            accumulate: accumulate_rows,
            strict,
        } => {
            let unit = if user { Unit::User } else { Unit::Wall };
            let input = read_input(&file).await?;
            if accumulate_rows {
                accumulate(&input, unit, strict)?
            } else {
                let mode = if plain { Mode::Plain } else { Mode::Sum };
                reshape(&input, unit, mode, strict)?
            }
        }
        Commands::Blocks { file } => block_averages(&read_input(&file).await?)?,
        Commands::Totals { file } => operation_sums(&read_input(&file).await?)?,
        Commands::Combine {
            times_file,
            counts_file,
        } => combine_counts(
            &read_input(&times_file).await?,
            &read_input(&counts_file).await?,
        )?,
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}

async fn read_input(path: &str) -> Result<String> {
    read_to_string(path)
        .await
        .context(format!("Read input file {path}"))
}
