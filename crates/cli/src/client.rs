// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the daemon socket protocol.

use laminar_core::MonitorScope;
use laminar_wire::{decode, encode, read_message, write_message, ProtocolError};
use laminar_wire::{Request, Response};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to daemon at {0} (is it running?): {1}")]
    Connect(PathBuf, std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    /// Client for the daemon named by the ambient environment.
    pub fn new() -> Self {
        let home = laminar_daemon::env::home_dir();
        Self { socket: laminar_daemon::env::socket_path(&home) }
    }

    async fn connect(&self) -> Result<UnixStream, ClientError> {
        UnixStream::connect(&self.socket)
            .await
            .map_err(|e| ClientError::Connect(self.socket.clone(), e))
    }

    /// One request, one response.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream = self.connect().await?;
        write_message(&mut stream, &encode(request)?).await?;
        let payload = read_message(&mut stream).await?;
        Ok(decode(&payload)?)
    }

    /// Stream the raw log of a run to stdout until the daemon closes the
    /// subscription (or we are interrupted).
    pub async fn stream_log(&self, job: &str, num: u32) -> Result<(), ClientError> {
        let mut stream = self.connect().await?;
        let request = Request::Watch {
            scope: MonitorScope::Log { name: job.to_string(), num },
        };
        write_message(&mut stream, &encode(&request)?).await?;

        let mut stdout = tokio::io::stdout();
        loop {
            match read_message(&mut stream).await {
                Ok(chunk) => {
                    if stdout.write_all(&chunk).await.is_err() {
                        return Ok(());
                    }
                    let _ = stdout.flush().await;
                }
                Err(ProtocolError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
