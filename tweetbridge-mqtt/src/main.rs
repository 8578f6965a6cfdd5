//! tweetbridge-mqtt - relay MQTT messages to Twitter/X
//!
//! Subscribes to one topic and hands every message to the relay, one at a
//! time, until SIGINT or SIGTERM.
//!
//! The MQTT event loop and the relay run as separate tasks joined by a
//! bounded queue. The event loop must keep being polled while a message is
//! relayed, otherwise keep-alive pings and QoS 2 acknowledgements stall and
//! the broker drops the connection.

use clap::Parser;
use libtweetbridge::logging::{LogFormat, LoggingConfig};
use libtweetbridge::platforms::twitter::TwitterClient;
use libtweetbridge::{Config, DispatchOutcome, Relay, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Messages received but not yet relayed
const EVENT_QUEUE_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "tweetbridge-mqtt")]
#[command(version)]
#[command(about = "Relay MQTT messages to Twitter/X")]
#[command(long_about = "\
tweetbridge-mqtt - Relay MQTT messages to Twitter/X

DESCRIPTION:
    Subscribes to an MQTT topic and posts every message it receives as a
    tweet, using the OAuth credentials carried in the message itself.
    Accounts that hit Twitter's rate limits are paused until their limit
    resets; messages for paused accounts are dropped.

MESSAGE FORMAT:
    {
      \"TwitterConsumerKey\": \"...\",
      \"TwitterConsumerSecret\": \"...\",
      \"TwitterAccessToken\": \"...\",
      \"TwitterAccessSecret\": \"...\",
      \"Message\": \"text to post\",
      \"Images\": [\"<base64>\", ...]
    }

ENVIRONMENT:
    MQTT_BROKER       Broker address (tcp://host:port)
    MQTT_CLIENT_ID    Client identifier
    MQTT_TOPIC        Topic to subscribe to
    MQTT_USERNAME     Optional broker username
    MQTT_PASSWORD     Optional broker password
    TWEETBRIDGE_CONFIG  Config file path (default: ~/.config/tweetbridge/config.toml)

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (relays messages already received)

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Path to a TOML config file (overrides TWEETBRIDGE_CONFIG)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log output format: text, json, pretty
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(cli.log_format, cli.log_level.clone(), cli.verbose).init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::load_from_path(path)?;
            config.apply_env_overrides();
            config
        }
        None => Config::load()?,
    };
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    let twitter = Arc::new(TwitterClient::new(&config.twitter)?);
    let relay = Relay::new(twitter.clone(), twitter)
        .with_upload_policy(config.relay.upload_failure_policy);

    let (host, port) = config.mqtt.broker_address()?;
    let mut options = MqttOptions::new(config.mqtt.client_id.clone(), host, port);
    options.set_keep_alive(Duration::from_secs(config.mqtt.keep_alive_secs));
    if let Some((username, password)) = config.mqtt.credentials() {
        options.set_credentials(username, password);
    }

    info!(
        "tweetbridge-mqtt starting (broker: {}, topic: {}, upload failure policy: {:?})",
        config.mqtt.broker,
        config.mqtt.topic,
        relay.upload_policy()
    );

    let (events, queue) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let worker = tokio::spawn(dispatch_worker(relay, queue, config.relay.purge_interval()));

    let (client, mut eventloop) = AsyncClient::new(options, 10);
    let shutdown = shutdown_signal()?;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected");
                    // Subscribing on every ConnAck restores the subscription after reconnects
                    if let Err(e) = client.try_subscribe(config.mqtt.topic.clone(), QoS::ExactlyOnce) {
                        error!("Error subscribing: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    info!("Subscribed to: {}", config.mqtt.topic);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!("Received: {} ({} bytes)", publish.topic, publish.payload.len());
                    if events.send(publish.payload.to_vec()).await.is_err() {
                        error!("Dispatch worker is gone, dropping message");
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Connection lost: {}", e);
                    info!("Attempting to reconnect");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            },
        }
    }

    // Closing the queue lets the worker finish what was already received
    drop(events);
    if let Err(e) = worker.await {
        error!("Dispatch worker failed: {}", e);
    }

    disconnect(&client, &mut eventloop).await;
    info!("tweetbridge-mqtt stopped");
    Ok(())
}

/// Relay queued payloads one at a time until the queue closes
///
/// Expired rate-limit entries are swept every `purge_every` between messages.
async fn dispatch_worker(relay: Relay, mut queue: mpsc::Receiver<Vec<u8>>, purge_every: Duration) {
    let mut purge = tokio::time::interval(purge_every);
    purge.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            payload = queue.recv() => match payload {
                Some(payload) => log_outcome(&relay.dispatch(&payload).await),
                None => break,
            },
            _ = purge.tick() => {
                relay.purge_expired();
            }
        }
    }

    debug!("Dispatch worker stopped");
}

fn log_outcome(outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::Posted {
            status,
            media_attached,
            throttled_until,
        } => {
            info!(
                "Posted (HTTP {}, {} image(s) attached)",
                status, media_attached
            );
            if let Some(reset_at) = throttled_until {
                info!("Account paused until {}", reset_at);
            }
        }
        DispatchOutcome::Filtered => debug!("Message ignored: no credentials"),
        DispatchOutcome::Blocked { .. } | DispatchOutcome::Failed(_) => {}
    }
}

/// Send DISCONNECT and give the event loop a moment to flush it
async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        warn!("Failed to request disconnect: {}", e);
        return;
    }

    let flush = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    };

    if tokio::time::timeout(DISCONNECT_TIMEOUT, flush).await.is_err() {
        warn!("Timed out waiting for broker disconnect");
    }
}

#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use futures::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    Ok(async move {
        if let Some(signal) = signals.next().await {
            info!("Signal caught ({}) -> Exit", signal);
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Signal caught -> Exit");
        }
    })
}
