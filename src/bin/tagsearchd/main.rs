//! # Tag Search Daemon
//!
//! Runs the search index with its snapshot publisher and serves the query,
//! ingestion and silence APIs over HTTP.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use tagsearch::http::{build_router, AppState};
use tagsearch::sched::{JsonFileStore, Schedule, SilenceStore};
use tagsearch::storage::Search;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> io::Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let search = Arc::new(Search::builder().with_publish_delay(cli.publish_delay).build());
    let _publisher = search.spawn_publisher();

    let mut builder = Schedule::builder();
    if let Some(path) = &cli.silence_file {
        let store: Arc<dyn SilenceStore> = Arc::new(JsonFileStore::new(path));
        builder = builder.with_store(store);
    }
    if let Some(fixed_time) = cli.fixed_now {
        builder = builder.with_fixed_now(fixed_time);
    }
    let schedule = builder.build().map_err(io::Error::other)?;
    tracing::info!(silences = schedule.silences().len(), "loaded silences");

    let state = AppState::builder().with_search(search).with_schedule(Arc::new(schedule)).build()?;
    let app = build_router(state);

    let addr: SocketAddr = cli.listen.parse().map_err(io::Error::other)?;
    tracing::info!("starting tagsearchd on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
