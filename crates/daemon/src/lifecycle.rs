// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, serving, shutdown.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use laminar_core::SystemClock;
use laminar_storage::{Database, StorageError};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::engine::{DaemonEngine, Engine, Settings};
use crate::listener::Listener;
use crate::watch::{self, ConfigWatcher};
use crate::env;

/// Daemon configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (`LAMINAR_HOME`).
    pub home: PathBuf,
    /// Path to the Unix socket.
    pub socket_path: PathBuf,
    /// Path to the lock/PID file.
    pub lock_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let home = env::home_dir();
        Self {
            socket_path: env::socket_path(&home),
            lock_path: home.join("laminard.pid"),
            home,
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("config watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A started daemon, ready to serve.
#[derive(Debug)]
pub struct Daemon {
    pub engine: Arc<DaemonEngine>,
    config: Config,
    socket: UnixListener,
    // NOTE(lifetime): held to keep the exclusive lock and the fs watch alive
    #[allow(dead_code)]
    lock_file: File,
    #[allow(dead_code)]
    watcher: ConfigWatcher,
}

/// Start the daemon: lock the home directory, open the database, load
/// configuration, bind the socket, and arm the config watcher.
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    let settings = Settings {
        home: config.home.clone(),
        title: env::title(),
        archive_url: env::archive_url(),
    };
    std::fs::create_dir_all(settings.nodes_dir())?;
    std::fs::create_dir_all(settings.jobs_dir())?;

    // lock first so a second daemon cannot race past this point
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let db = Database::open(&config.home.join("laminar.sqlite"))?;
    let engine = Engine::new(settings, db, SystemClock)?;

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let socket = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    let watcher = watch::spawn(Arc::clone(&engine))?;

    info!(home = %config.home.display(), "laminar daemon started");

    Ok(Daemon { engine, config: config.clone(), socket, lock_file, watcher })
}

impl Daemon {
    /// Serve until SIGINT or SIGTERM, then shut down.
    pub async fn run(self) -> Result<(), LifecycleError> {
        let Daemon { engine, config, socket, lock_file: _lock_file, watcher: _watcher } = self;

        tokio::spawn(Listener::new(socket, Arc::clone(&engine)).run());

        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }

        info!("shutting down");
        engine.abort_all();

        // give aborted runs a moment to reach their terminal transition so
        // their results are persisted
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let (_, busy) = engine.executor_counts();
            if busy == 0 || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if let Err(e) = std::fs::remove_file(&config.socket_path) {
            warn!(error = %e, "failed to remove socket file");
        }
        if let Err(e) = std::fs::remove_file(&config.lock_path) {
            warn!(error = %e, "failed to remove pid file");
        }
        info!("daemon shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
