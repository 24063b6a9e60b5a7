//! promdict HTTP server
//!
//! Starts an Axum web server whose requests are spread across worker
//! registries sharing one store, and serves the aggregated metrics.

use clap::Parser;
use promdict::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    exporter, handlers, simulate, telemetry, worker,
};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Path used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config { output }) => {
            let template = generate_config_template();
            match output {
                Some(path) => {
                    std::fs::write(&path, template)?;
                    println!("Wrote configuration template to {}", path);
                }
                None => print!("{}", template),
            }
            Ok(())
        }
        Some(Command::Simulate { duration, rate }) => {
            let config = load_config(&cli.config)?;
            telemetry::init(&config.observability.log_level);

            let workers = worker::spawn_workers(&config)?;
            simulate::run(&workers, Duration::from_secs(duration), rate).await;
            print!("{}", exporter::render(workers[0].registry()));
            Ok(())
        }
        Some(Command::Serve) | None => serve(load_config(&cli.config)?).await,
    }
}

/// Load the config file, falling back to defaults if the default path is absent
fn load_config(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
    if path == DEFAULT_CONFIG_PATH && !Path::new(path).exists() {
        return Ok(Config::default());
    }
    Ok(Config::from_file(path)?)
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        "Starting promdict server on {}:{}",
        config.server.host,
        config.server.port
    );

    let workers = worker::spawn_workers(&config)?;
    let flushers: Vec<_> = workers.iter().map(|worker| worker.start()).collect();

    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    let state = handlers::AppState::new(config, workers)?;
    let app = handlers::router(state);

    tracing::info!("Listening on {}", addr);
    tracing::info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    for flusher in flushers {
        flusher.abort();
    }
    Ok(())
}
