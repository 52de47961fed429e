use clap::Parser;
use hfw_cli::cli::{Cli, Commands};
use hfw_cli::commands::{run_init_topic, run_stats, INIT_TOPIC_SCRIPT_ID, STATS_SCRIPT_ID};
use hfw_logger::{create_logger, LoggerOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let share = cli.command.share_decision();
    match cli.command {
        Commands::Stats { .. } => {
            let options = with_store(LoggerOptions::new(STATS_SCRIPT_ID, "setup"), &cli.store);
            let mut logger = create_logger(options).await?;
            run_stats(&mut logger, share).await?;
        }

        Commands::InitTopic { memo } => {
            let options = with_store(
                LoggerOptions::new(INIT_TOPIC_SCRIPT_ID, "setup").skip_topic_validation(),
                &cli.store,
            );
            let mut logger = create_logger(options).await?;
            run_init_topic(&mut logger, &memo).await?;
        }
    }

    Ok(())
}

fn with_store(options: LoggerOptions, store: &Option<std::path::PathBuf>) -> LoggerOptions {
    match store {
        Some(path) => options.with_store_path(path),
        None => options,
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "hfw=debug,hfw_cli=debug,hfw_logger=debug,hfw_telemetry=debug"
    } else {
        "hfw=info,hfw_cli=info,hfw_logger=info,hfw_telemetry=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
