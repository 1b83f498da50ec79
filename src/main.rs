use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, bail};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sonicart::application::{CoverArtService, CoverArtServiceConfig, PerformanceMonitor};
use sonicart::domain::{CacheKey, LoadState, PersistentStore};
use sonicart::infrastructure::config::Command;
use sonicart::infrastructure::{AppConfig, CliArgs, ConfigLoader, DiskCoverCache, SubsonicClient};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let loader = ConfigLoader::new().wrap_err("Failed to locate config directory")?;
    let mut config = loader
        .load(args.config.as_deref())
        .wrap_err("Failed to load configuration")?;
    config.merge_with_args(args);
    Ok(config)
}

fn build_service(
    config: &AppConfig,
    disk: Arc<DiskCoverCache>,
    monitor: Arc<PerformanceMonitor>,
) -> Result<CoverArtService> {
    if !config.server.is_configured() {
        bail!("No music server configured: set [server] url or pass --server-url");
    }
    let provider = Arc::new(SubsonicClient::new(config.server.client_config())?);

    let service_config = CoverArtServiceConfig {
        memory: config.cache.memory_budget(),
        max_concurrent_downloads: config.cache.max_concurrent_downloads,
        stagger_step: config.cache.stagger_step(),
        stagger_max: config.cache.stagger_max(),
        event_capacity: config.cache.event_capacity,
    };
    Ok(CoverArtService::new(provider, disk, monitor, service_config))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;
    init_logging(&config)?;

    info!(version = sonicart::VERSION, "Starting {}", sonicart::NAME);

    let cache_dir = config.cache.effective_disk_dir();
    let disk_max = config.cache.disk_max_bytes;
    let disk = tokio::task::spawn_blocking(move || DiskCoverCache::open(cache_dir, disk_max))
        .await?
        .wrap_err("Failed to open disk cache")?;
    let disk = Arc::new(disk);
    let monitor = Arc::new(PerformanceMonitor::new());

    let outcome = match args.command {
        Command::Fetch {
            id,
            kind,
            context,
            output,
        } => {
            let service = build_service(&config, Arc::clone(&disk), Arc::clone(&monitor))?;
            let key = CacheKey::for_context(&id, kind, context);
            let (state, source) = service.request_with_source(&id, kind, context).await;
            println!("{key}: {state}");

            match state {
                LoadState::Loaded(image) => {
                    if let Some(source) = source {
                        println!("source: {source}");
                    }
                    if let Some(path) = output {
                        image
                            .image()
                            .save(&path)
                            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
                        println!("wrote {}", path.display());
                    }
                    Ok(())
                }
                other => Err(other),
            }
        }
        Command::Prefetch { ids, kind, context } => {
            let service = build_service(&config, Arc::clone(&disk), Arc::clone(&monitor))?;
            let results = service.request_batch(&ids, kind, context, None).await;
            for (key, state) in &results {
                println!("{key}: {state}");
            }
            println!("{}", service.cache_stats());
            Ok(())
        }
        Command::Stats => {
            println!(
                "{}: {} covers, {} KiB of {} KiB",
                disk.cache_dir().display(),
                disk.count(),
                disk.total_bytes() / 1024,
                disk.max_size() / 1024,
            );
            Ok(())
        }
        Command::ClearDisk => {
            let count = disk.count();
            disk.clear().wrap_err("Failed to clear disk cache")?;
            println!("removed {count} covers from {}", disk.cache_dir().display());
            Ok(())
        }
    };

    disk.flush().wrap_err("Failed to write disk cache index")?;
    println!("{}", monitor.stats());

    if let Err(state) = outcome {
        bail!("cover not loaded: {state}");
    }
    Ok(())
}
