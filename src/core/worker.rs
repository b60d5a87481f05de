use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, eyre};
use tokio::{
    sync::{Mutex as TokioMutex, broadcast, mpsc},
    time::{Instant, sleep, sleep_until},
};

use crate::{
    adapters::{hades_session::HadesSession, telnet::TelnetRelay},
    config::{HadesConfig, SettingsHandle},
    ports::worker::Worker,
    utils::{backoff::Backoff, graceful_shutdown::ShutdownToken},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const OUTPUT_CHANNEL_CAPACITY: usize = 256;
const INPUT_CHANNEL_CAPACITY: usize = 64;

/// Why a connected session ended
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Disconnected,
}

/// Hosted worker keeping the Hades session alive and relaying it.
///
/// The `hades` section is re-read from the live settings on every connection
/// attempt, so reloaded connection settings apply from the next reconnect.
pub struct HadesBridgeWorker {
    settings: SettingsHandle,
    output: broadcast::Sender<Vec<u8>>,
    input_tx: mpsc::Sender<String>,
    input_rx: TokioMutex<mpsc::Receiver<String>>,
}

impl HadesBridgeWorker {
    pub fn new(settings: SettingsHandle) -> Self {
        let (output, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
        Self {
            settings,
            output,
            input_tx,
            input_rx: TokioMutex::new(input_rx),
        }
    }

    /// Receive the Hades server output one line per message, telnet commands removed
    pub fn subscribe_output(&self) -> broadcast::Receiver<Vec<u8>> {
        self.output.subscribe()
    }

    /// Queue a line to send to the Hades server
    pub fn input(&self) -> mpsc::Sender<String> {
        self.input_tx.clone()
    }

    async fn start_relay(&self, shutdown: &ShutdownToken) -> Result<Option<tokio::task::JoinHandle<()>>> {
        let telnet = self.settings.load().telnet.clone();
        let Some(port) = telnet.port else {
            tracing::info!("Telnet relay disabled (telnet.port not set)");
            return Ok(None);
        };

        let relay = TelnetRelay::bind(&telnet.bind_address, port).await?;
        Ok(Some(tokio::spawn(relay.serve(
            self.output.clone(),
            self.input_tx.clone(),
            shutdown.clone(),
        ))))
    }

    async fn pump(
        &self,
        mut session: HadesSession,
        hades: &HadesConfig,
        input: &mut mpsc::Receiver<String>,
        shutdown: &mut ShutdownToken,
    ) -> Result<SessionEnd> {
        if hades.auto_login {
            let (Some(username), Some(password)) = (&hades.username, &hades.password) else {
                return Err(eyre!("hades.auto_login requires hades.username and hades.password"));
            };
            tracing::info!("Logging in to Hades as {}", username);
            session.send_line(username).await?;
            session.send_line(password).await?;
        }

        let idle_interval = Duration::from_secs(hades.idle_interval_secs.max(1));
        let mut idle_deadline = Instant::now() + idle_interval;

        loop {
            tokio::select! {
                _ = shutdown.wait_for_shutdown() => return Ok(SessionEnd::Shutdown),
                line = session.read_line() => match line? {
                    Some(line) => {
                        tracing::trace!("Hades: {}", String::from_utf8_lossy(&line).trim_end());
                        // No subscribers is not an error
                        let _ = self.output.send(line);
                    }
                    None => return Ok(SessionEnd::Disconnected),
                },
                Some(line) = input.recv() => {
                    session.send_line(&line).await?;
                    idle_deadline = Instant::now() + idle_interval;
                }
                _ = sleep_until(idle_deadline), if hades.prevent_idle => {
                    tracing::debug!("Sending keep-alive to {}", session.peer());
                    session.send_line("").await?;
                    idle_deadline = Instant::now() + idle_interval;
                }
            }
        }
    }
}

#[async_trait]
impl Worker for HadesBridgeWorker {
    fn name(&self) -> &str {
        "hades-bridge"
    }

    async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        let mut input = self.input_rx.lock().await;
        let relay = self.start_relay(&shutdown).await?;

        let initial_max = self.settings.load().hades.reconnect_max_delay_secs;
        let mut backoff = Backoff::new(INITIAL_RECONNECT_DELAY, Duration::from_secs(initial_max));

        loop {
            let hades = self.settings.load().hades.clone();
            let server = hades
                .server
                .clone()
                .ok_or_else(|| eyre!("hades.server is not configured"))?;

            tracing::info!("Connecting to Hades at {}:{}", server, hades.port);
            let end = tokio::select! {
                _ = shutdown.wait_for_shutdown() => SessionEnd::Shutdown,
                connected = HadesSession::connect(&server, hades.port, CONNECT_TIMEOUT) => match connected {
                    Ok(session) => {
                        tracing::info!("Connected to Hades at {}", session.peer());
                        backoff.set_max(Duration::from_secs(hades.reconnect_max_delay_secs));
                        backoff.reset();
                        match self.pump(session, &hades, &mut input, &mut shutdown).await {
                            Ok(end) => end,
                            Err(e) => {
                                tracing::warn!("Hades session error: {:?}", e);
                                SessionEnd::Disconnected
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to connect to Hades: {:?}", e);
                        SessionEnd::Disconnected
                    }
                },
            };

            if end == SessionEnd::Shutdown {
                break;
            }

            let delay = backoff.next_delay();
            tracing::info!("Reconnecting to Hades in {:?}", delay);
            tokio::select! {
                _ = shutdown.wait_for_shutdown() => break,
                _ = sleep(delay) => {}
            }
        }

        if let Some(relay) = relay {
            let _ = relay.await;
        }
        Ok(())
    }
}
