// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/server/listener.rs
// Version: 1.0.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// This file contains the TCP listener of the work server, located in the
// server module. Each accepted connection runs in its own task: read until the
// request is complete, answer once and close.
//
// Tree Location:
// - src/server/listener.rs (connection lifecycle)
// - Depends on: tokio, server::request, server::handler

use crate::miner::ComputeDevice;
use crate::server::handler::RequestHandler;
use crate::server::protocol::{ProtocolError, error_body, http_response};
use crate::server::request::{MAX_REQUEST_SIZE, ParseState, RawRequest, RequestParser};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

const LOG_TARGET: &str = "nano_pow::server";

pub struct WorkServer<D: ComputeDevice> {
    handler: Arc<RequestHandler<D>>,
    read_timeout: Duration,
}

impl<D: ComputeDevice + 'static> WorkServer<D> {
    pub fn new(handler: Arc<RequestHandler<D>>, read_timeout: Duration) -> Self {
        Self { handler, read_timeout }
    }

    /// Bind the listening socket; failure here is fatal for the process
    pub async fn bind(addr: SocketAddr) -> crate::Result<TcpListener> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            error!(target: LOG_TARGET, "❌ Failed to bind work server to {}: {}", addr, e);
            format!("failed to bind {}: {}", addr, e)
        })?;
        info!(target: LOG_TARGET, "🌐 Work server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept connections forever, one task per connection
    pub async fn run(self, listener: TcpListener) -> crate::Result<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(target: LOG_TARGET, "Accept failed: {}", e);
                    continue;
                }
            };
            debug!(target: LOG_TARGET, "🔌 Connection from {}", peer);

            let handler = Arc::clone(&self.handler);
            let read_timeout = self.read_timeout;
            tokio::spawn(async move {
                if let Err(e) = serve_connection(&handler, stream, read_timeout).await {
                    debug!(target: LOG_TARGET, "Connection {} ended with error: {}", peer, e);
                }
            });
        }
    }
}

/// Read one request, answer it and shut the stream down
pub async fn serve_connection<D, S>(handler: &RequestHandler<D>, mut stream: S, read_timeout: Duration) -> std::io::Result<()>
where
    D: ComputeDevice + 'static,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let body = match read_request(&mut stream, read_timeout).await {
        Ok(Some(request)) => handler.handle(&request).await,
        Ok(None) => {
            debug!(target: LOG_TARGET, "Connection closed without data");
            return Ok(());
        }
        Err(e) => {
            warn!(target: LOG_TARGET, "Rejecting request: {}", e);
            error_body(e, None)
        }
    };

    stream.write_all(&http_response(&body)).await?;
    stream.flush().await?;
    stream.shutdown().await
}

/// Accumulate reads until the parser completes, the peer stops sending, or a
/// read stays idle longer than `read_timeout`
pub async fn read_request<R>(reader: &mut R, read_timeout: Duration) -> Result<Option<RawRequest>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut parser = RequestParser::new();
    let mut chunk = vec![0u8; MAX_REQUEST_SIZE];

    loop {
        match tokio::time::timeout(read_timeout, reader.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                if parser.push(&chunk[..n])? == ParseState::Complete {
                    break;
                }
            }
            Ok(Err(e)) => {
                debug!(target: LOG_TARGET, "Read error after {} bytes: {}", parser.buffered(), e);
                break;
            }
            Err(_) => {
                debug!(target: LOG_TARGET, "Read idle for {:?} after {} bytes", read_timeout, parser.buffered());
                break;
            }
        }
    }

    Ok(parser.finish())
}

// Changelog:
// - v1.0.0 (2025-07-02): Initial listener replacing the web dashboard server.
//   - Raw TCP, one response per connection, Connection: close.
