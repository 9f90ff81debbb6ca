//! courier - HTTP サーバーとワーカーを 1 プロセスで動かすバイナリ
//!
//! - `courier serve`（デフォルト）: HTTP 面 + ワーカーグループ
//! - `courier demo <payload>`: 1 件投入して完了まで追いかける

mod http;
mod logging;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use courier_core::app::{App, AppBuilder};
use courier_core::config::Settings;
use courier_core::domain::TaskState;

#[derive(Debug, Parser)]
#[command(name = "courier", version, about = "Task queue pipeline with rate limiting and caching")]
struct Args {
    /// TOML settings file
    #[arg(long, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `server.listen_addr`
    #[arg(long)]
    listen: Option<String>,

    /// Turn the entity cache on regardless of USE_CACHE
    #[arg(long)]
    use_cache: bool,

    #[arg(long, env = "COURIER_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve HTTP and run the workers
    Serve,
    /// Submit one task and poll it until it completes
    Demo {
        #[arg(default_value = "hello")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env は無くてもよい
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(args.log_json);

    let settings = load_settings(&args)?;
    let app = AppBuilder::new(settings)
        .build()
        .context("failed to build application")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(app).await,
        Command::Demo { payload } => demo(app, &payload).await,
    }
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;
    settings.apply_env(|key| std::env::var(key).ok())?;
    if let Some(listen) = &args.listen {
        settings.server.listen_addr = listen.clone();
    }
    if args.use_cache {
        settings.cache.enabled = true;
    }
    Ok(settings)
}

async fn serve(app: App) -> anyhow::Result<()> {
    let listen_addr = &app.settings().server.listen_addr;
    let listen: SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("invalid listen address `{listen_addr}`"))?;

    let workers = app.spawn_workers();
    let (addr, server) = warp::serve(http::routes(app.service()))
        .try_bind_with_graceful_shutdown(listen, shutdown_signal())
        .with_context(|| format!("cannot bind {listen}"))?;

    info!(
        %addr,
        instance = app.service().instance(),
        workers = workers.len(),
        cache = app.settings().cache.enabled,
        "server running"
    );
    server.await;

    info!("waiting for workers to finish their current task");
    workers.shutdown_and_join().await;
    info!("stopped");
    Ok(())
}

async fn demo(app: App, payload: &str) -> anyhow::Result<()> {
    let workers = app.spawn_workers();
    let service = app.service();

    let task_id = service.submit("demo", payload).await?;
    info!(task_id = %task_id, "submitted");

    loop {
        let state = service.poll_status(&task_id).await?;
        info!(task_id = %task_id, state = %state, "polled");
        if state == TaskState::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    workers.shutdown_and_join().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
