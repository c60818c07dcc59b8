use clap::Parser;
use mailback_archiver::Archiver;

mod args;
use args::Args;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command-line arguments
    let args = Args::parse();
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    ::log::info!("Archiving files listed at {}", config.index_url);
    ::log::info!("Writing to {}", config.archive_dir.display());

    match Archiver::new(config).run().await {
        Ok(summary) => {
            ::log::info!(
                "Archiving complete - {} files, {} archived, {} unpacked, {} failed in {:.2} seconds",
                summary.total,
                summary.archived,
                summary.unpacked,
                summary.failed,
                summary.elapsed.as_secs_f64()
            );
        }
        Err(e) => {
            ::log::error!("Archiving failed: {}", e);
            std::process::exit(1);
        }
    }
}
