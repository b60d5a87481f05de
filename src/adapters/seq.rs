//! Ships `tracing` events to a Seq server in CLEF (compact log event format).
//!
//! [`SeqLayer`] turns each event into one CLEF JSON line and hands it to the
//! [`SeqShipper`] task over a bounded channel. The shipper posts batches to
//! `<server_url>/api/events/raw?clef`. When the channel is full, events are
//! dropped rather than blocking the logging thread.
use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use eyre::{Context, Result};
use serde_json::{Map, Value};
use tokio::{
    sync::{Notify, mpsc},
    task::JoinHandle,
};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context as LayerContext};

const CHANNEL_CAPACITY: usize = 4096;
const MAX_BATCH: usize = 100;
const FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const CLEF_CONTENT_TYPE: &str = "application/vnd.serilog.clef";

/// Targets whose events are never shipped; they are emitted while shipping.
const EXCLUDED_TARGETS: [&str; 4] = ["reqwest", "hyper", "h2", "rustls"];

/// Seq level name for a `tracing` level
fn clef_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "Verbose",
        Level::DEBUG => "Debug",
        Level::INFO => "Information",
        Level::WARN => "Warning",
        Level::ERROR => "Error",
    }
}

#[derive(Default)]
struct ClefVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl ClefVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }

    fn into_clef(self, timestamp: DateTime<Utc>, level: &Level, target: &str) -> String {
        let mut event = Map::new();
        event.insert(
            "@t".to_string(),
            Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        event.insert("@l".to_string(), Value::String(clef_level(level).to_string()));
        event.insert(
            "@m".to_string(),
            Value::String(self.message.unwrap_or_default()),
        );
        event.insert("SourceContext".to_string(), Value::String(target.to_string()));
        for (key, value) in self.fields {
            event.entry(key).or_insert(value);
        }
        Value::Object(event).to_string()
    }
}

impl Visit for ClefVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }
}

/// `tracing` layer feeding the Seq shipper
pub struct SeqLayer {
    tx: mpsc::Sender<String>,
}

impl SeqLayer {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

impl<S> Layer<S> for SeqLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: LayerContext<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if EXCLUDED_TARGETS
            .iter()
            .any(|excluded| target == *excluded || target.starts_with(&format!("{excluded}::")))
        {
            return;
        }

        let mut visitor = ClefVisitor::default();
        event.record(&mut visitor);
        let line = visitor.into_clef(Utc::now(), metadata.level(), target);
        let _ = self.tx.try_send(line);
    }
}

/// Posts CLEF batches to Seq
pub struct SeqShipper {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl SeqShipper {
    pub fn new(server_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .wrap_err("Failed to build Seq HTTP client")?;
        Ok(Self {
            client,
            endpoint: Self::endpoint(server_url),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Raw ingestion endpoint for a Seq base URL
    pub fn endpoint(server_url: &str) -> String {
        format!("{}/api/events/raw?clef", server_url.trim_end_matches('/'))
    }

    async fn post(&self, batch: &[String]) -> Result<()> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CLEF_CONTENT_TYPE)
            .body(batch.join("\n"));
        if let Some(api_key) = &self.api_key {
            request = request.header("X-Seq-ApiKey", api_key);
        }

        request
            .send()
            .await
            .wrap_err("Failed to send events to Seq")?
            .error_for_status()
            .wrap_err("Seq rejected events")?;
        Ok(())
    }

    async fn flush(&self, batch: &mut Vec<String>) {
        if batch.is_empty() {
            return;
        }
        // Logging through tracing here would feed the events back into this shipper
        if let Err(e) = self.post(batch).await {
            eprintln!("Failed to ship {} event(s) to Seq: {e:#}", batch.len());
        }
        batch.clear();
    }

    /// Spawn the shipping task reading from `rx`
    pub fn spawn(self, rx: mpsc::Receiver<String>) -> SeqHandle {
        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(self.run(rx, stop.clone()));
        SeqHandle { task, stop }
    }

    async fn run(self, mut rx: mpsc::Receiver<String>, stop: Arc<Notify>) {
        let mut batch = Vec::with_capacity(MAX_BATCH);
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + FLUSH_INTERVAL,
            FLUSH_INTERVAL,
        );

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(line) => {
                        batch.push(line);
                        if batch.len() >= MAX_BATCH {
                            self.flush(&mut batch).await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => self.flush(&mut batch).await,
                _ = stop.notified() => break,
            }
        }

        while let Ok(line) = rx.try_recv() {
            batch.push(line);
            if batch.len() >= MAX_BATCH {
                self.flush(&mut batch).await;
            }
        }
        self.flush(&mut batch).await;
    }
}

/// Keeps the shipping task alive; call [`SeqHandle::shutdown`] before exit to flush.
pub struct SeqHandle {
    task: JoinHandle<()>,
    stop: Arc<Notify>,
}

impl SeqHandle {
    pub async fn shutdown(self) {
        self.stop.notify_one();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.task).await.is_err() {
            eprintln!("Timed out flushing events to Seq");
        }
    }
}

/// Build the layer and start the shipper for `server_url`
pub fn seq_sink(server_url: &str, api_key: Option<String>) -> Result<(SeqLayer, SeqHandle)> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let shipper = SeqShipper::new(server_url, api_key)?;
    Ok((SeqLayer::new(tx), shipper.spawn(rx)))
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::oneshot,
    };
    use tracing_subscriber::{Registry, layer::SubscriberExt};

    use super::*;

    #[test]
    fn test_layer_formats_clef() {
        let (tx, mut rx) = mpsc::channel(8);
        let subscriber = Registry::default().with(SeqLayer::new(tx));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "hades_bridge::core::worker", attempt = 3, peer = "hades:23", "Reconnecting");
            tracing::info!(target: "hyper::client", "not shipped");
        });

        let line = rx.try_recv().unwrap();
        let event: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(event["@l"], "Warning");
        assert_eq!(event["@m"], "Reconnecting");
        assert_eq!(event["SourceContext"], "hades_bridge::core::worker");
        assert_eq!(event["attempt"], 3);
        assert_eq!(event["peer"], "hades:23");
        assert!(event["@t"].as_str().unwrap().ends_with('Z'));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            SeqShipper::endpoint("http://seq:5341/"),
            "http://seq:5341/api/events/raw?clef"
        );
        assert_eq!(
            SeqShipper::endpoint("https://logs.example.org/seq"),
            "https://logs.example.org/seq/api/events/raw?clef"
        );
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if data.len() >= header_end + 4 + content_length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, request_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket
                .write_all(b"HTTP/1.1 201 Created\r\ncontent-length: 0\r\n\r\n")
                .await
                .unwrap();
            let _ = request_tx.send(request);
        });

        let (tx, rx) = mpsc::channel(8);
        let shipper = SeqShipper::new(&format!("http://{addr}"), Some("key".to_string())).unwrap();
        let handle = shipper.spawn(rx);

        tx.send(r#"{"@m":"first"}"#.to_string()).await.unwrap();
        tx.send(r#"{"@m":"second"}"#.to_string()).await.unwrap();
        handle.shutdown().await;

        let request = tokio::time::timeout(Duration::from_secs(5), request_rx)
            .await
            .unwrap()
            .unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /api/events/raw?clef"));
        assert!(lower.contains("x-seq-apikey: key"));
        assert!(lower.contains("content-type: application/vnd.serilog.clef"));
        assert!(request.contains("{\"@m\":\"first\"}\n{\"@m\":\"second\"}"));
    }
}
