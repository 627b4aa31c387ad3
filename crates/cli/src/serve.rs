use std::path::PathBuf;

use console::style;
use tickstream::{AppState, DatasetSource, ServerError, ServerOptions, StreamOptions, serve};
use tracing::info;

use crate::Context;

#[derive(Debug, Clone, PartialEq, Default, clap::Args)]
pub struct ServeCommand {
    /// Host to bind to
    #[arg(long, env = "TICKSTREAM_HOST")]
    pub host: Option<String>,

    /// Port to run the server on
    #[arg(long, short = 'p', env = "TICKSTREAM_PORT")]
    pub port: Option<u16>,

    /// Period between events, in milliseconds
    #[arg(long, env = "TICKSTREAM_INTERVAL_MS")]
    pub interval_ms: Option<u64>,

    /// Reconnection time advertised to clients, in milliseconds
    #[arg(long, env = "TICKSTREAM_RETRY_MS")]
    pub retry_ms: Option<u64>,

    /// Maximum number of events replayed to a resuming client
    #[arg(long, env = "TICKSTREAM_MAX_BACKFILL")]
    pub max_backfill: Option<u64>,

    /// Event type, also used to namespace event IDs
    #[arg(long, env = "TICKSTREAM_TAG")]
    pub tag: Option<String>,

    /// JSON dataset to serve (defaults to the bundled countries)
    #[arg(long, short = 'd', env = "TICKSTREAM_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Seconds between keep-alive comments on idle streams (0 disables them)
    #[arg(long, env = "TICKSTREAM_KEEP_ALIVE_SECS")]
    pub keep_alive_secs: Option<u64>,
}

impl ServeCommand {
    /// Merge command-line and environment values over the config file.
    pub fn server_options(&self, ctx: &Context) -> ServerOptions {
        let config = &ctx.config;
        let defaults = &config.stream;

        ServerOptions {
            host: self.host.clone().unwrap_or_else(|| config.server.host.clone()),
            port: self.port.unwrap_or(config.server.port),
            keep_alive_secs: self
                .keep_alive_secs
                .unwrap_or(config.server.keep_alive_secs),
            stream: StreamOptions {
                interval_ms: self.interval_ms.unwrap_or(defaults.interval_ms),
                retry_ms: self.retry_ms.unwrap_or(defaults.retry_ms),
                max_backfill: self.max_backfill.unwrap_or(defaults.max_backfill),
                tag: self.tag.clone().unwrap_or_else(|| defaults.tag.clone()),
            },
            dataset: DatasetSource::from(self.dataset.clone().or_else(|| config.dataset.clone())),
        }
    }

    pub async fn execute(&self, ctx: &Context) -> Result<(), ServerError> {
        let options = self.server_options(ctx);

        // Load before binding so a bad dataset never accepts a connection
        let state = AppState::load(options.clone())?;

        let addr = options.address();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind(addr.clone(), e))?;
        let local = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or(addr);

        println!();
        println!("{}", style("Tickstream").green());
        if let Some(path) = &ctx.config_path {
            println!("{} {}", style("Config").dim(), path.display());
        }
        println!(
            "{} {} records from {}",
            style("Dataset").dim(),
            state.engine.dataset().len(),
            options.dataset
        );
        println!(
            "{} every {} ms as '{}'",
            style("Events").dim(),
            options.stream.interval_ms,
            options.stream.tag
        );
        println!();
        println!("{}", style("Endpoints").dim());
        println!("  GET http://{}/countries", local);
        println!("  GET http://{}/countries/stream", local);
        println!("  GET http://{}/v3/api-docs", local);
        println!("  GET http://{}/health", local);
        println!();
        println!("{}", style("Press Ctrl+C to stop").dim());
        println!();

        info!(address = %local, "Listening");
        serve(listener, state).await
    }
}
