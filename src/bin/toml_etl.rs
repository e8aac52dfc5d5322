use anyhow::Context;
use clap::Parser;
use fmp_etl::config::toml_config::{RequestConfig, TomlConfig};
use fmp_etl::core::{ConfigProvider, Pipeline};
use fmp_etl::utils::error::EtlError;
use fmp_etl::utils::{logger, validation::Validate};
use fmp_etl::{EtlEngine, HistoryPipeline, Interval, LocalStorage, RawPipeline, ReturnsPipeline};

#[derive(Parser)]
#[command(name = "toml_etl")]
#[command(about = "FMP price ETL driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "fmp-etl.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Dry run - show which endpoints would be requested without calling them
    #[arg(long)]
    dry_run: bool,
}

async fn run_engine<P: Pipeline>(pipeline: P, monitor_enabled: bool) -> Result<String, EtlError> {
    EtlEngine::new_with_monitoring(pipeline, monitor_enabled)
        .run()
        .await
}

async fn run(config: TomlConfig, monitor_enabled: bool) -> Result<String, EtlError> {
    let storage = LocalStorage::new(config.output_path().to_string());

    match config.request.clone() {
        RequestConfig::History { ticker, .. } => {
            let interval = config.request.interval()?;
            let pipeline = HistoryPipeline::new(storage, config, ticker, interval)?;
            run_engine(pipeline, monitor_enabled).await
        }
        RequestConfig::Returns { .. } => {
            let request = config.request.returns_request()?;
            let pipeline = ReturnsPipeline::new(storage, config, request)?;
            run_engine(pipeline, monitor_enabled).await
        }
        RequestConfig::Raw { path } => {
            let pipeline = RawPipeline::new(storage, config, path)?;
            run_engine(pipeline, monitor_enabled).await
        }
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    if let Some(description) = &config.pipeline.description {
        println!("  Description: {}", description);
    }
    println!("  Source: {}", config.base_url());
    println!("  Request: {}", config.request.kind());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    if config.compress() {
        println!("  Compression: {}.zip", config.file_stem());
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) -> anyhow::Result<()> {
    let base = config.base_url().trim_end_matches('/');

    println!("🔍 Dry Run Analysis:");
    println!();
    println!("📡 Requests:");

    match &config.request {
        RequestConfig::History { ticker, .. } => {
            let interval = config.request.interval()?;
            if interval.is_intraday() {
                println!("  GET {}/historical-chart/{}/{}", base, interval, ticker);
            } else {
                println!("  GET {}/historical-price-full/{}", base, ticker);
                if interval != Interval::Daily {
                    println!("  ⚙️ Resample daily rows to {}", interval);
                }
            }
        }
        RequestConfig::Returns { .. } => {
            let request = config.request.returns_request()?;
            for ticker in request.symbols() {
                println!("  GET {}/historical-price-full/{}", base, ticker);
            }
            println!("  ⚙️ {} returns, outer-joined on the period", request.period);
            if request.relative {
                println!("  📐 Relative to index");
            }
        }
        RequestConfig::Raw { path } => {
            println!("  GET {}/{}", base, path.trim_start_matches('/'));
        }
    }

    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_path());
    for format in config.output_formats() {
        println!("  File: {}.{}", config.file_stem(), format);
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config file '{}'", args.config))?;

    logger::init(args.verbose, config.json_logs());

    tracing::info!("🚀 Starting TOML-based FMP ETL");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual requests will be made");
        return perform_dry_run(&config);
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    match run(config, monitor_enabled).await {
        Ok(output_path) => {
            tracing::info!("✅ ETL process completed successfully!");
            println!("✅ ETL process completed successfully!");
            println!("📁 Output saved to: {}", output_path);
            Ok(())
        }
        Err(e) => {
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
    }
}
