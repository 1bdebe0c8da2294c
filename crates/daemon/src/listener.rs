// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections and handles each in a spawned task. A connection
//! carries one request; `Watch` switches it into a streaming subscription
//! that lasts until the client hangs up.

use crate::engine::{ClientMsg, Engine, RunHandle};
use laminar_core::Clock;
use laminar_wire::{decode, encode, read_message, write_message, ProtocolError};
use laminar_wire::{Request, Response};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Listener task for accepting socket connections.
pub struct Listener<C: Clock + 'static> {
    unix: UnixListener,
    engine: Arc<Engine<C>>,
}

impl<C: Clock + 'static> Listener<C> {
    pub fn new(unix: UnixListener, engine: Arc<Engine<C>>) -> Self {
        Self { unix, engine }
    }

    /// Run the accept loop, spawning a task per connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let engine = Arc::clone(&self.engine);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        match handle_connection(reader, writer, &engine).await {
                            Ok(()) | Err(ConnectionError::Protocol(ProtocolError::ConnectionClosed)) => {
                                debug!("client disconnected")
                            }
                            Err(e) => error!(error = %e, "connection error"),
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept error"),
            }
        }
    }
}

async fn handle_connection<R, W, C>(
    mut reader: R,
    mut writer: W,
    engine: &Arc<Engine<C>>,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    C: Clock + 'static,
{
    let payload = read_message(&mut reader).await?;
    let request: Request = decode(&payload)?;

    match request {
        Request::Queue { job, params } => {
            let response = match engine.queue_run(&job, params) {
                Ok(_) => Response::Queued { job },
                Err(e) => Response::Error { message: e.to_string() },
            };
            respond(&mut writer, &response).await
        }

        Request::Start { job, params } => {
            let response = match engine.queue_run(&job, params) {
                Ok(handle) => match handle.started.await {
                    Ok(num) => Response::Started { job, num },
                    Err(_) => Response::Error { message: "job could not be started".into() },
                },
                Err(e) => Response::Error { message: e.to_string() },
            };
            respond(&mut writer, &response).await
        }

        Request::Run { job, params } => {
            let response = match engine.queue_run(&job, params) {
                Ok(handle) => run_to_completion(job, handle).await,
                Err(e) => Response::Error { message: e.to_string() },
            };
            respond(&mut writer, &response).await
        }

        Request::SetParam { job, num, key, value } => {
            let response = if engine.set_param(&job, num, &key, &value) {
                Response::Ok
            } else {
                Response::Error { message: format!("no such active run: {job} #{num}") }
            };
            respond(&mut writer, &response).await
        }

        Request::Abort { job, num } => {
            let response = if engine.abort(&job, num) {
                Response::Ok
            } else {
                Response::Error { message: format!("no such active run: {job} #{num}") }
            };
            respond(&mut writer, &response).await
        }

        Request::AbortAll => {
            engine.abort_all();
            respond(&mut writer, &Response::Ok).await
        }

        Request::Watch { scope } => watch_stream(reader, writer, engine, scope).await,
    }
}

async fn respond<W>(writer: &mut W, response: &Response) -> Result<(), ConnectionError>
where
    W: AsyncWrite + Unpin,
{
    write_message(writer, &encode(response)?).await?;
    Ok(())
}

/// Wait out a run-and-wait request: admission, then the terminal result.
async fn run_to_completion(job: String, handle: RunHandle) -> Response {
    let RunHandle { started, mut completions, .. } = handle;
    let num = match started.await {
        Ok(num) => num,
        Err(_) => {
            return Response::Error { message: "job could not be started".into() }
        }
    };
    loop {
        match completions.recv().await {
            Ok(c) if c.job == job && c.num == num => {
                return Response::Completed { job, num, result: c.result }
            }
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => {
                return Response::Error { message: "engine shut down".into() }
            }
        }
    }
}

/// Stream status frames (or raw log frames) for a scope until the client
/// hangs up. Subscriber I/O errors tear down only this subscription.
async fn watch_stream<R, W, C>(
    mut reader: R,
    mut writer: W,
    engine: &Arc<Engine<C>>,
    scope: laminar_core::MonitorScope,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    C: Clock + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = engine.register_client(scope, tx);

    let mut probe = [0u8; 64];
    loop {
        tokio::select! {
            msg = rx.recv() => {
                let frame = match msg {
                    Some(ClientMsg::Status(doc)) => match encode(&doc) {
                        Ok(bytes) => bytes,
                        Err(_) => break,
                    },
                    Some(ClientMsg::Log(bytes)) => bytes,
                    None => break,
                };
                if write_message(&mut writer, &frame).await.is_err() {
                    break;
                }
            }
            read = reader.read(&mut probe) => match read {
                // client hung up (or sent garbage we don't care about)
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            },
        }
    }

    engine.deregister_client(id);
    Ok(())
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
