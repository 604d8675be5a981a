use clap::Parser;
use provider_harvest::core::pacing::{Pacer, RateLimiter};
use provider_harvest::core::progress::TracingObserver;
use provider_harvest::domain::ports::TokioSleeper;
use provider_harvest::utils::error::{ErrorSeverity, HarvestError};
use provider_harvest::utils::{logger, validation::Validate};
use provider_harvest::{
    CliConfig, FileSink, GooglePlacesClient, HarvestEngine, HarvestSettings, LocalStorage,
    SearchOrchestrator,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在時忽略
    dotenvy::dotenv().ok();
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("Starting provider-harvest CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli.clone_redacted());
    }

    let settings = match HarvestSettings::from_cli(&cli).and_then(|s| s.validate().map(|_| s)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let exit_code = match run(settings).await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(
                "❌ Harvest failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            }
        }
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn run(settings: HarvestSettings) -> Result<(), HarvestError> {
    let api_key = settings.require_api_key()?.to_string();
    let client = GooglePlacesClient::new(&settings.endpoint, api_key, settings.timeout)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("🛑 Interrupt received, finishing with what was collected");
                cancel.cancel();
            }
        }
    });

    let mut pacer = Pacer::new(Arc::new(TokioSleeper), cancel);
    if let Some(rate) = settings.max_requests_per_second {
        pacer = pacer.with_rate_limiter(RateLimiter::per_second(rate));
    }

    let orchestrator = SearchOrchestrator::new(client, settings.search.clone())
        .with_pacer(pacer)
        .with_observer(Arc::new(TracingObserver));
    let sink = FileSink::new(
        LocalStorage::new(settings.output_path.clone()),
        settings.output_path.clone(),
    )
    .with_formats(settings.formats()?)
    .with_compression(settings.compress)
    .with_location_column(settings.tag_location);

    let report = HarvestEngine::new(orchestrator, sink)
        .run(&settings.request())
        .await?;

    let summary = &report.outcome.summary;
    println!("✅ Saved {} records to {}", summary.total_records, report.output_location);
    for location in &summary.locations {
        println!("   {:<20} {:>4}  {:?}", location.location, location.count, location.status);
    }
    if !summary.errored_locations().is_empty() {
        println!("⚠️ Errored locations: {}", summary.errored_locations().join(", "));
    }
    Ok(())
}
