// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `laminar`: CI server daemon and client in one binary.

mod client;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client::DaemonClient;
use laminar_core::RunState;
use laminar_wire::{Request, Response};
use std::collections::HashMap;

#[derive(Parser)]
#[command(name = "laminar", version, about = "Lightweight continuous integration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the server in the foreground
    Daemon,

    /// Queue a job; return immediately
    Queue {
        job: String,
        /// KEY=VALUE parameters passed to the job scripts
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Queue a job; return once it has started
    Start {
        job: String,
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Queue a job; return once it has finished, failing unless it succeeded
    Run {
        job: String,
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Abort an active run
    Abort { job: String, num: u32 },

    /// Set a KEY=VALUE parameter on an active run
    Set {
        job: String,
        num: u32,
        #[arg(value_parser = parse_param)]
        param: (String, String),
    },

    /// Stream the log of a run to stdout
    Log { job: String, num: u32 },
}

fn parse_param(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{arg}'"))
}

fn param_map(params: Vec<(String, String)>) -> HashMap<String, String> {
    params.into_iter().collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Daemon => {
            let config = laminar_daemon::Config::load();
            let daemon = laminar_daemon::lifecycle::startup(&config)
                .await
                .context("daemon startup failed")?;
            daemon.run().await?;
        }

        Command::Queue { job, params } => {
            let response = DaemonClient::new()
                .send(&Request::Queue { job, params: param_map(params) })
                .await?;
            match response {
                Response::Queued { job } => println!("{job} queued"),
                other => bail_on(other)?,
            }
        }

        Command::Start { job, params } => {
            let response = DaemonClient::new()
                .send(&Request::Start { job, params: param_map(params) })
                .await?;
            match response {
                Response::Started { job, num } => println!("{job} #{num} started"),
                other => bail_on(other)?,
            }
        }

        Command::Run { job, params } => {
            let response = DaemonClient::new()
                .send(&Request::Run { job, params: param_map(params) })
                .await?;
            match response {
                Response::Completed { job, num, result } => {
                    println!("{job} #{num}: {result}");
                    if result != RunState::Success {
                        std::process::exit(1);
                    }
                }
                other => bail_on(other)?,
            }
        }

        Command::Abort { job, num } => {
            let response =
                DaemonClient::new().send(&Request::Abort { job, num }).await?;
            match response {
                Response::Ok => println!("aborted"),
                other => bail_on(other)?,
            }
        }

        Command::Set { job, num, param } => {
            let (key, value) = param;
            let response = DaemonClient::new()
                .send(&Request::SetParam { job, num, key, value })
                .await?;
            match response {
                Response::Ok => {}
                other => bail_on(other)?,
            }
        }

        Command::Log { job, num } => {
            DaemonClient::new().stream_log(&job, num).await?;
        }
    }
    Ok(())
}

/// Turn an unexpected response into a CLI error.
fn bail_on(response: Response) -> Result<()> {
    match response {
        Response::Error { message } => bail!("{message}"),
        other => bail!("unexpected response: {other:?}"),
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
