//! MQTT client for receiving vehicle location updates
//!
//! Subscribes to `{prefix}/cars/{id}/{geofence|latitude|longitude}` for every
//! configured vehicle and forwards each publish as a `LocationUpdate`.

use crate::domain::types::{LocationUpdate, TopicKind, VehicleId};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use rumqttc::{AsyncClient, ClientError, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Upper bound on flushing the DISCONNECT packet at shutdown
const DISCONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// Topic for one vehicle and message kind
pub fn topic_for(prefix: &str, vehicle_id: VehicleId, kind: TopicKind) -> String {
    format!("{}/cars/{}/{}", prefix, vehicle_id, kind.as_str())
}

/// All topics subscribed for a vehicle
pub fn topics_for(prefix: &str, vehicle_id: VehicleId) -> Vec<String> {
    TopicKind::ALL.iter().map(|kind| topic_for(prefix, vehicle_id, *kind)).collect()
}

/// Attribute a topic to a vehicle and message kind
///
/// Returns `None` for anything outside `{prefix}/cars/{id}/{kind}`.
pub fn parse_topic(prefix: &str, topic: &str) -> Option<(VehicleId, TopicKind)> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix("/cars/")?;
    let (id, kind) = rest.split_once('/')?;
    Some((id.parse().ok()?, kind.parse().ok()?))
}

/// Start the MQTT client and send location updates to the channel
///
/// Updates are sent via try_send to avoid blocking the MQTT eventloop.
/// Dropped updates are counted in metrics and logged (rate-limited).
/// On shutdown the client disconnects from the broker before returning.
pub async fn start_mqtt_client(
    config: &Config,
    vehicle_ids: &[VehicleId],
    event_tx: mpsc::Sender<LocationUpdate>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ClientError> {
    let mut mqttoptions = MqttOptions::new(config.mqtt_client_id(), config.mqtt_host(), config.mqtt_port());
    mqttoptions.set_keep_alive(Duration::from_secs(config.mqtt_keep_alive_secs()));

    // Set credentials if configured
    if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password()) {
        mqttoptions.set_credentials(username, password);
    }

    let (client, mut eventloop) = AsyncClient::new(mqttoptions, 100);
    let prefix = config.mqtt_topic_prefix();
    for id in vehicle_ids {
        for topic in topics_for(prefix, *id) {
            client.subscribe(topic, QoS::AtMostOnce).await?;
        }
    }

    info!(
        prefix = %prefix,
        vehicles = %vehicle_ids.len(),
        host = %config.mqtt_host(),
        port = %config.mqtt_port(),
        "mqtt_subscribed"
    );

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("mqtt_shutdown");
                    if let Err(e) = client.disconnect().await {
                        warn!(error = %e, "mqtt_disconnect_failed");
                    }
                    // Drive the eventloop so the DISCONNECT packet is flushed
                    let _ = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
                        while eventloop.poll().await.is_ok() {}
                    })
                    .await;
                    return Ok(());
                }
            }
            result = eventloop.poll() => {
                match result {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let Some((vehicle_id, kind)) = parse_topic(prefix, &publish.topic) else {
                            debug!(topic = %publish.topic, "mqtt_topic_ignored");
                            continue;
                        };
                        let payload = match std::str::from_utf8(&publish.payload) {
                            Ok(p) => p,
                            Err(e) => {
                                metrics.record_parse_error();
                                warn!(topic = %publish.topic, error = %e, "mqtt_payload_invalid_utf8");
                                continue;
                            }
                        };

                        metrics.record_update_received();
                        let update = LocationUpdate::new(vehicle_id, kind, payload);
                        if let Err(e) = event_tx.try_send(update) {
                            match e {
                                TrySendError::Full(_) => {
                                    metrics.record_update_dropped();
                                    if last_drop_warn.elapsed() > Duration::from_secs(1) {
                                        warn!("location_update_dropped: channel full");
                                        last_drop_warn = Instant::now();
                                    }
                                }
                                TrySendError::Closed(_) => {
                                    warn!("location_channel_closed");
                                    return Ok(());
                                }
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt_connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "mqtt_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}
