//! MQTT client for the measuring device: readings in, commands out

use crate::domain::command::DeviceCommand;
use crate::domain::reading::{DeviceTopics, SensorReading};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// What happened to one incoming publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    /// Queued for the session
    Sent,
    /// Not a device topic
    Ignored,
    /// Payload could not be decoded
    Invalid,
    /// Session channel full
    Dropped,
    /// Session channel closed
    Closed,
}

/// Rate-limits a repeated warning to once per interval
struct WarnLimiter {
    last: Instant,
    interval: Duration,
}

impl WarnLimiter {
    fn new(interval: Duration) -> Self {
        // Allow immediate first warning
        Self { last: Instant::now() - interval * 2, interval }
    }

    fn ready(&mut self) -> bool {
        if self.last.elapsed() > self.interval {
            self.last = Instant::now();
            true
        } else {
            false
        }
    }
}

/// Decode one publish and hand it to the session without blocking
pub fn forward_publish(
    topics: &DeviceTopics,
    topic: &str,
    payload: &[u8],
    reading_tx: &mpsc::Sender<SensorReading>,
    metrics: &Metrics,
) -> Forward {
    let reading = match SensorReading::parse(topics, topic, payload) {
        Ok(Some(reading)) => reading,
        Ok(None) => {
            debug!(topic = %topic, "ignored_topic");
            return Forward::Ignored;
        }
        Err(e) => {
            metrics.record_decode_error();
            warn!(error = %e, "invalid_reading");
            return Forward::Invalid;
        }
    };

    match reading_tx.try_send(reading) {
        Ok(()) => Forward::Sent,
        Err(TrySendError::Full(_)) => {
            metrics.record_reading_dropped();
            Forward::Dropped
        }
        Err(TrySendError::Closed(_)) => Forward::Closed,
    }
}

/// Queue one command for publishing on the device command topic
///
/// Uses try_publish so a full request queue never stalls the eventloop
/// that drains it.
pub fn publish_command(
    client: &AsyncClient,
    topic: &str,
    command: DeviceCommand,
) -> Result<(), rumqttc::ClientError> {
    client.try_publish(topic, QoS::AtLeastOnce, false, command.payload())?;
    info!(command = command.as_str(), payload = command.payload(), topic = %topic, "device_command_sent");
    Ok(())
}

/// Start the MQTT client, send decoded readings to the channel and publish
/// queued device commands
///
/// Readings are sent via try_send to avoid blocking the MQTT eventloop.
/// Dropped readings are counted in metrics and logged (rate-limited).
pub async fn start_device_client(
    config: &Config,
    reading_tx: mpsc::Sender<SensorReading>,
    mut command_rx: mpsc::Receiver<DeviceCommand>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut mqttoptions =
        MqttOptions::new(config.client_id(), config.device_host(), config.device_port());
    mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_secs()));
    // Images arrive as single publishes
    mqttoptions.set_max_packet_size(16 * 1024 * 1024, 16 * 1024 * 1024);

    // Set credentials if configured
    if let (Some(username), Some(password)) = (config.device_username(), config.device_password())
    {
        mqttoptions.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
    let topics = config.topics().clone();
    for topic in topics.all() {
        client.subscribe(topic, QoS::AtMostOnce).await?;
    }

    info!(
        host = %config.device_host(),
        port = %config.device_port(),
        topics = ?topics.all(),
        "device_client_subscribed"
    );

    // Rate-limit drop warnings to 1 per second
    let mut drop_warn = WarnLimiter::new(Duration::from_secs(1));

    loop {
        tokio::select! {
            // Check for shutdown signal
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("device_client_shutdown");
                    return Ok(());
                }
            }
            Some(command) = command_rx.recv() => {
                if let Err(e) = publish_command(&client, &topics.command, command) {
                    error!(command = command.as_str(), error = %e, "device_command_failed");
                }
            }
            // Process MQTT events
            result = eventloop.poll() => {
                match result {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match forward_publish(&topics, &publish.topic, &publish.payload, &reading_tx, &metrics) {
                            Forward::Dropped => {
                                if drop_warn.ready() {
                                    warn!("reading_dropped: channel full");
                                }
                            }
                            Forward::Closed => {
                                warn!("reading_channel_closed");
                                return Ok(());
                            }
                            Forward::Sent | Forward::Ignored | Forward::Invalid => {}
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("device_connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "device_connection_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}
