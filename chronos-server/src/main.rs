//! Chronos daemon entry point: loads configuration, wires the timer
//! handler to its worker pools and HTTP front-end, and runs until SIGTERM
//! (spec.md §5 "Cancellation / shutdown").

mod cli;
mod pop_loop;
mod reload;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chronos_cluster::{ChronosConfig, ClusterFileConfig, ClusterMembership, ClusterView};
use chronos_handler::{Clock, SystemClock, TimerHandler};
use chronos_http::{AppState, HealthChecker, HttpServer};
use clap::Parser;
use crossbeam_channel::unbounded;
use tracing::info;

use cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = PathBuf::from(&cli.config);
    let cluster_config_path = PathBuf::from(&cli.cluster_config);

    let chronos_config = if config_path.exists() {
        ChronosConfig::load(&config_path).context("failed to parse chronos.conf")?
    } else {
        info!(path = %config_path.display(), "no chronos.conf found, using defaults");
        ChronosConfig::default()
    };
    let cluster_file_config =
        ClusterFileConfig::load(&cluster_config_path).context("failed to parse chronos_cluster.conf")?;

    let bind_addr = cli::resolve_bind_address(&chronos_config.http_bind_address, chronos_config.http_bind_port)?;

    println!();
    println!("Chronos - clustered, replicated timer service");
    println!();
    println!("  Cluster config:     {}", cluster_config_path.display());
    println!("  Bind address:       {bind_addr}");
    println!("  Replication factor: {}", cli.replication_factor);
    println!();

    let view = ClusterView::from_file_config(&cluster_file_config);
    let cluster = Arc::new(ClusterMembership::new(view));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    // The replicator pool needs no back-reference to the handler, so its
    // sender plugs straight into `TimerHandler::new`. The callback pool
    // does need an `Arc<TimerHandler>` (spec.md §4.6: re-inserts before
    // firing), which the handler can't hand out before it exists — the
    // cyclic ownership spec.md §9 calls out is resolved the same way here:
    // an intermediate queue the handler sends into, bridged to the pool's
    // own queue once the pool is up.
    let replicator_pool = chronos_replication::spawn_replicator_pool(chronos_replication::DEFAULT_REPLICATOR_WORKERS);
    let (callback_tx, callback_rx) = unbounded();

    let handler = Arc::new(TimerHandler::new(
        Arc::clone(&cluster),
        Arc::clone(&clock),
        cli.replication_factor,
        replicator_pool.sender(),
        callback_tx,
    ));

    let callback_pool = chronos_replication::spawn_callback_pool(
        chronos_replication::DEFAULT_CALLBACK_WORKERS,
        Arc::clone(&handler),
    );
    let callback_pool_sender = callback_pool.sender();
    let callback_bridge = std::thread::Builder::new()
        .name("chronos-callback-bridge".to_string())
        .spawn(move || {
            while let Ok(pair) = callback_rx.recv() {
                if callback_pool_sender.send(pair).is_err() {
                    break;
                }
            }
        })
        .expect("failed to spawn callback bridge thread");

    let health = Arc::new(HealthChecker::new());
    health.mark_config_loaded();

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))
        .context("failed to install SIGTERM handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))
        .context("failed to install SIGINT handler")?;

    let pop_loop_handle = pop_loop::spawn(Arc::clone(&handler), pop_loop::DEFAULT_TICK_MS, Arc::clone(&shutdown));
    let reload_handle = reload::spawn(
        cluster_config_path,
        Arc::clone(&cluster),
        Arc::clone(&handler),
        Arc::clone(&health),
        Duration::from_millis(cli.reload_interval_ms),
        Arc::clone(&shutdown),
    );

    let mut server = HttpServer::bind(bind_addr).context("failed to bind HTTP front-end")?;
    let state = AppState { handler: Arc::clone(&handler), health };

    println!("Server is ready. Send SIGTERM or press Ctrl+C to stop.");
    println!();

    let run_result = server.run(&state, &shutdown).context("HTTP server error");

    // spec.md §5: close the listener, terminate the replicator queue,
    // terminate the callback queue, join all worker threads, then exit.
    drop(server);
    drop(state);
    pop_loop_handle.join().expect("pop loop thread panicked");
    reload_handle.join().expect("reload thread panicked");

    replicator_pool.shutdown();
    callback_pool.shutdown();

    // Only once every other `Arc<TimerHandler>` clone (the pop loop, the
    // reload watcher, the dispatcher state, every callback worker) has
    // gone does dropping this last handle close the handler's own end of
    // the callback bridge channel, letting the bridge thread's `recv()`
    // return and the thread exit.
    drop(handler);
    callback_bridge.join().expect("callback bridge thread panicked");

    run_result?;

    println!();
    println!("Server stopped gracefully.");
    Ok(())
}
