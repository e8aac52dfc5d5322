use clap::Parser;
use fmp_etl::core::Pipeline;
use fmp_etl::utils::error::{EtlError, Result};
use fmp_etl::utils::{logger, validation::Validate};
use fmp_etl::{
    CliConfig, Command, EtlEngine, HistoryPipeline, LocalStorage, RawPipeline, ReturnsPipeline,
    ReturnsRequest,
};

async fn run_engine<P: Pipeline>(pipeline: P, monitor_enabled: bool) -> Result<String> {
    EtlEngine::new_with_monitoring(pipeline, monitor_enabled)
        .run()
        .await
}

async fn run(config: CliConfig) -> Result<String> {
    let storage = LocalStorage::new(config.output_path.clone());
    let monitor_enabled = config.monitor;

    match config.command.clone() {
        Command::History { ticker, interval } => {
            let pipeline = HistoryPipeline::new(storage, config, ticker, interval.parse()?)?;
            run_engine(pipeline, monitor_enabled).await
        }
        Command::Returns {
            tickers,
            period,
            index,
            relative,
        } => {
            let request = ReturnsRequest {
                tickers,
                period: period.parse()?,
                compare_with_index: index,
                relative,
            };
            let pipeline = ReturnsPipeline::new(storage, config, request)?;
            run_engine(pipeline, monitor_enabled).await
        }
        Command::Raw { path } => {
            let pipeline = RawPipeline::new(storage, config, path)?;
            run_engine(pipeline, monitor_enabled).await
        }
    }
}

fn report_failure(e: &EtlError) -> ! {
    tracing::error!(
        "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(e.exit_code().max(1));
}

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    logger::init(config.verbose, config.json_logs);

    tracing::info!("Starting fmp-etl CLI");
    tracing::debug!(
        "Command: {:?}, base URL: {}, output: {}",
        config.command,
        config.base_url,
        config.output_path
    );

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        report_failure(&e);
    }

    if config.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(config).await {
        Ok(output_path) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("✅ ETL process completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => report_failure(&e),
    }
}
