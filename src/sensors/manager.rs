//! BLE transport for the power meter and heart rate strap.
//!
//! The manager scans for peripherals advertising the Cycling Power or Heart
//! Rate service, connects, subscribes to the measurement characteristic and
//! forwards every notification unparsed as a [`SensorEvent::Notification`].
//! When a notification stream ends the source is reported as disconnected.
//! Nothing here touches decoder or session state.

use crate::sensors::types::{
    ConnectionState, DiscoveredSensor, SensorConfig, SensorError, SensorEvent, SensorType,
};
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use chrono::Utc;
use crossbeam::channel::{Receiver, Sender};
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Poll interval while waiting for a peripheral to be discovered.
const DISCOVERY_POLL: Duration = Duration::from_millis(250);

type DiscoveredMap = Arc<Mutex<HashMap<String, DiscoveredSensor>>>;

fn ble_error(e: btleplug::Error) -> SensorError {
    SensorError::BleError(e.to_string())
}

/// Owns the adapter and the connected peripherals.
pub struct SensorManager {
    config: SensorConfig,
    adapter: Option<Adapter>,
    event_tx: Option<Sender<SensorEvent>>,
    discovered: DiscoveredMap,
    /// device_id -> connected peripheral
    connected: HashMap<String, (Peripheral, SensorType)>,
    scanning: Arc<AtomicBool>,
}

impl SensorManager {
    pub fn new(config: SensorConfig) -> Self {
        Self {
            config,
            adapter: None,
            event_tx: None,
            discovered: Arc::new(Mutex::new(HashMap::new())),
            connected: HashMap::new(),
            scanning: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Pick the first Bluetooth adapter. Required before scanning.
    pub async fn initialize(&mut self) -> Result<(), SensorError> {
        let manager = Manager::new().await.map_err(ble_error)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(ble_error)?
            .into_iter()
            .next()
            .ok_or(SensorError::AdapterNotFound)?;

        tracing::info!("Bluetooth adapter ready");
        self.adapter = Some(adapter);
        Ok(())
    }

    /// Channel carrying every event from now on. Replaces any earlier receiver.
    pub fn event_receiver(&mut self) -> Receiver<SensorEvent> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.event_tx = Some(tx);
        rx
    }

    fn emit(&self, event: SensorEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn adapter(&self) -> Result<&Adapter, SensorError> {
        self.adapter.as_ref().ok_or(SensorError::AdapterNotFound)
    }

    /// Scan for power meters and heart rate straps in the background.
    pub async fn start_discovery(&mut self) -> Result<(), SensorError> {
        let adapter = self.adapter()?.clone();
        if self.scanning.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.discovered.lock().await.clear();

        let filter = ScanFilter {
            services: vec![
                SensorType::PowerMeter.service_uuid(),
                SensorType::HeartRate.service_uuid(),
            ],
        };
        if let Err(e) = adapter.start_scan(filter).await {
            self.scanning.store(false, Ordering::SeqCst);
            return Err(SensorError::ScanFailed(e.to_string()));
        }

        tracing::info!("Scanning for sensors");
        self.emit(SensorEvent::ScanStarted);

        tokio::spawn(discovery_task(
            adapter,
            self.discovered.clone(),
            self.event_tx.clone(),
            self.scanning.clone(),
        ));
        Ok(())
    }

    pub async fn stop_discovery(&mut self) -> Result<(), SensorError> {
        let adapter = self.adapter()?;
        if !self.scanning.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        adapter
            .stop_scan()
            .await
            .map_err(|e| SensorError::ScanFailed(e.to_string()))?;

        tracing::info!("Scan stopped");
        self.emit(SensorEvent::ScanStopped);
        Ok(())
    }

    /// Wait for a sensor of `sensor_type` to be discovered.
    ///
    /// `name_filter` is a case-insensitive substring of the advertised name.
    /// Fails with `SensorNotFound` once the discovery timeout passes.
    pub async fn wait_for_sensor(
        &self,
        sensor_type: SensorType,
        name_filter: Option<&str>,
    ) -> Result<DiscoveredSensor, SensorError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.discovery_timeout_secs);
        let filter = name_filter.map(str::to_lowercase);
        let matches = |sensor: &DiscoveredSensor| {
            sensor.sensor_type == sensor_type
                && filter
                    .as_deref()
                    .map_or(true, |f| sensor.name.to_lowercase().contains(f))
        };

        loop {
            let found = self
                .discovered
                .lock()
                .await
                .values()
                .find(|sensor| matches(sensor))
                .cloned();

            match found {
                Some(sensor) => {
                    tracing::info!("Found {}: {}", sensor_type, sensor.name);
                    return Ok(sensor);
                }
                None if Instant::now() >= deadline => {
                    return Err(SensorError::SensorNotFound(sensor_type.to_string()));
                }
                None => tokio::time::sleep(DISCOVERY_POLL).await,
            }
        }
    }

    /// Connect, subscribe to the measurement characteristic and start
    /// forwarding notifications.
    pub async fn connect(&mut self, sensor: &DiscoveredSensor) -> Result<(), SensorError> {
        let sensor_type = sensor.sensor_type;
        let device_id = sensor.device_id.clone();

        self.emit(SensorEvent::ConnectionChanged {
            sensor_type,
            device_id: device_id.clone(),
            state: ConnectionState::Connecting,
        });

        let peripheral = self.find_peripheral(&device_id).await?;

        let timeout = Duration::from_secs(self.config.connection_timeout_secs);
        tokio::time::timeout(timeout, peripheral.connect())
            .await
            .map_err(|_| SensorError::ConnectionTimeout)?
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| SensorError::ConnectionFailed(e.to_string()))?;

        let measurement = sensor_type.measurement_uuid();
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == measurement)
            .ok_or_else(|| {
                SensorError::SubscriptionFailed(format!("{} has no measurement characteristic", sensor.name))
            })?;
        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| SensorError::SubscriptionFailed(e.to_string()))?;

        let notifications = peripheral.notifications().await.map_err(ble_error)?;

        self.connected
            .insert(device_id.clone(), (peripheral, sensor_type));
        self.emit(SensorEvent::ConnectionChanged {
            sensor_type,
            device_id: device_id.clone(),
            state: ConnectionState::Connected,
        });
        tracing::info!("Connected to {} {}", sensor_type, sensor.name);

        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let mut notifications = notifications;
            while let Some(notification) = notifications.next().await {
                if SensorType::from_measurement(notification.uuid) != Some(sensor_type) {
                    continue;
                }
                if let Some(tx) = &event_tx {
                    let _ = tx.send(SensorEvent::Notification {
                        sensor_type,
                        data: notification.value,
                        received_at: Utc::now(),
                    });
                }
            }

            tracing::info!("{} notifications ended", sensor_type);
            if let Some(tx) = &event_tx {
                let _ = tx.send(SensorEvent::ConnectionChanged {
                    sensor_type,
                    device_id,
                    state: ConnectionState::Disconnected,
                });
            }
        });

        Ok(())
    }

    async fn find_peripheral(&self, device_id: &str) -> Result<Peripheral, SensorError> {
        self.adapter()?
            .peripherals()
            .await
            .map_err(ble_error)?
            .into_iter()
            .find(|p| p.id().to_string() == device_id)
            .ok_or_else(|| SensorError::SensorNotFound(device_id.to_string()))
    }

    pub async fn disconnect(&mut self, device_id: &str) -> Result<(), SensorError> {
        let Some((peripheral, sensor_type)) = self.connected.remove(device_id) else {
            return Ok(());
        };

        tracing::info!("Disconnecting {} {}", sensor_type, device_id);
        peripheral.disconnect().await.map_err(ble_error)?;

        self.emit(SensorEvent::ConnectionChanged {
            sensor_type,
            device_id: device_id.to_string(),
            state: ConnectionState::Disconnected,
        });
        Ok(())
    }

    pub async fn get_discovered(&self) -> Vec<DiscoveredSensor> {
        self.discovered.lock().await.values().cloned().collect()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Stop scanning and drop every connection. Errors are logged, not returned.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stop_discovery().await {
            tracing::warn!("Stopping scan failed: {}", e);
        }

        let device_ids: Vec<String> = self.connected.keys().cloned().collect();
        for device_id in device_ids {
            if let Err(e) = self.disconnect(&device_id).await {
                tracing::warn!("Disconnecting {} failed: {}", device_id, e);
            }
        }
    }
}

/// Record every advertised power meter or strap until scanning stops.
async fn discovery_task(
    adapter: Adapter,
    discovered: DiscoveredMap,
    event_tx: Option<Sender<SensorEvent>>,
    scanning: Arc<AtomicBool>,
) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            tracing::error!("Adapter event stream unavailable: {}", e);
            return;
        }
    };

    while let Some(event) = events.next().await {
        if !scanning.load(Ordering::SeqCst) {
            break;
        }
        let (CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id)) = event else {
            continue;
        };
        let Ok(peripheral) = adapter.peripheral(&id).await else {
            continue;
        };
        let Some(sensor) = classify(&peripheral).await else {
            continue;
        };

        let is_new = discovered
            .lock()
            .await
            .insert(sensor.device_id.clone(), sensor.clone())
            .is_none();
        if is_new {
            tracing::debug!("Discovered {} {}", sensor.sensor_type, sensor.name);
            if let Some(tx) = &event_tx {
                let _ = tx.send(SensorEvent::Discovered(sensor));
            }
        }
    }
}

async fn classify(peripheral: &Peripheral) -> Option<DiscoveredSensor> {
    let properties = peripheral.properties().await.ok()??;
    let sensor_type = SensorType::from_services(&properties.services)?;

    Some(DiscoveredSensor {
        device_id: peripheral.id().to_string(),
        name: properties
            .local_name
            .unwrap_or_else(|| sensor_type.to_string()),
        sensor_type,
        rssi: properties.rssi,
        last_seen: Instant::now(),
    })
}
