use std::net::SocketAddr;

use eyre::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::{broadcast, mpsc},
    task::JoinSet,
};

use crate::{adapters::telnet::TelnetFilter, utils::graceful_shutdown::ShutdownToken};

/// Local telnet listener sharing the Hades session.
///
/// Every client receives the session output; lines typed by any client are
/// forwarded to the session.
pub struct TelnetRelay {
    listener: TcpListener,
}

impl TelnetRelay {
    pub async fn bind(bind_address: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((bind_address, port))
            .await
            .with_context(|| format!("Failed to bind telnet relay on {bind_address}:{port}"))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until shutdown
    pub async fn serve(
        self,
        output: broadcast::Sender<Vec<u8>>,
        input: mpsc::Sender<String>,
        mut shutdown: ShutdownToken,
    ) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!("Telnet relay listening on {}", addr);
        }

        let mut clients = JoinSet::new();
        loop {
            tokio::select! {
                _ = shutdown.wait_for_shutdown() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!("Telnet client connected: {}", peer);
                        clients.spawn(handle_client(
                            stream,
                            peer,
                            output.subscribe(),
                            input.clone(),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => tracing::warn!("Telnet accept error: {}", e),
                },
                // Reap finished client tasks
                Some(_) = clients.join_next(), if !clients.is_empty() => {}
            }
        }

        clients.shutdown().await;
        tracing::info!("Telnet relay stopped");
    }
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    mut output: broadcast::Receiver<Vec<u8>>,
    input: mpsc::Sender<String>,
    mut shutdown: ShutdownToken,
) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut filter = TelnetFilter::new();
    // Persists across select iterations so a partially read line is not lost
    let mut line = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => break,
            received = output.recv() => match received {
                Ok(bytes) => {
                    if let Err(e) = writer.write_all(&bytes).await {
                        tracing::debug!("Telnet client {} write error: {}", peer, e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Telnet client {} lagging, skipped {} chunk(s)", peer, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            read = reader.read_until(b'\n', &mut line) => match read {
                Ok(0) => break,
                Ok(_) => {
                    let text = filter.filter(&line);
                    line.clear();
                    let command = String::from_utf8_lossy(&text)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    if input.try_send(command).is_err() {
                        tracing::warn!("Hades input queue full, dropping line from {}", peer);
                    }
                }
                Err(e) => {
                    tracing::debug!("Telnet client {} read error: {}", peer, e);
                    break;
                }
            },
        }
    }

    tracing::info!("Telnet client disconnected: {}", peer);
}
