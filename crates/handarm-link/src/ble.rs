//! Bluetooth Low Energy backend built on `btleplug`.
//!
//! The arm runs a Nordic-UART-style GATT service.  The host never reads
//! from it; every command is a write-without-response to the TX
//! characteristic.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use handarm_types::{ArmError, PeripheralHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery::{Advertisement, Scanner};
use crate::session::{Connector, Link};

/// UART service advertised by the arm firmware.
pub const UART_SERVICE: Uuid = Uuid::from_u128(0x6E400001_B5A3_F393_E0A9_E50E24DCCA9E);
/// Host → arm characteristic.
pub const UART_TX_CHAR: Uuid = Uuid::from_u128(0x6E400002_B5A3_F393_E0A9_E50E24DCCA9E);

/// How often the peripheral list is polled while scanning.
const SCAN_POLL: Duration = Duration::from_millis(200);

fn adapter_err(context: &str, e: btleplug::Error) -> ArmError {
    ArmError::Adapter(format!("{context}: {e}"))
}

/// The host's BLE central role on one local adapter.
#[derive(Clone)]
pub struct BleCentral {
    adapter: Adapter,
}

impl BleCentral {
    /// Use the first adapter the platform reports.
    ///
    /// # Errors
    ///
    /// [`ArmError::Adapter`] when Bluetooth is unavailable or no adapter is
    /// present.
    pub async fn first_adapter() -> Result<Self, ArmError> {
        let manager = Manager::new().await.map_err(|e| adapter_err("bluetooth manager", e))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| adapter_err("listing adapters", e))?
            .into_iter()
            .next()
            .ok_or_else(|| ArmError::Adapter("no bluetooth adapter found".to_string()))?;
        if let Ok(info) = adapter.adapter_info().await {
            info!(adapter = %info, "bluetooth adapter ready");
        }
        Ok(Self { adapter })
    }

    async fn advertisements(&self) -> Result<Vec<(Advertisement, Peripheral)>, ArmError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| adapter_err("listing peripherals", e))?;
        let mut seen = Vec::with_capacity(peripherals.len());
        for p in peripherals {
            let name = match p.properties().await {
                Ok(Some(props)) => props.local_name,
                Ok(None) => None,
                Err(e) => {
                    debug!(error = %e, "skipping peripheral without properties");
                    continue;
                }
            };
            let ad = Advertisement {
                name,
                address: peripheral_address(&p),
            };
            seen.push((ad, p));
        }
        Ok(seen)
    }

    async fn find(&self, address: &str) -> Result<Option<Peripheral>, ArmError> {
        Ok(self
            .advertisements()
            .await?
            .into_iter()
            .find(|(ad, _)| ad.address == address)
            .map(|(_, p)| p))
    }
}

fn peripheral_address(p: &Peripheral) -> String {
    format!("{:?}", p.id())
}

#[async_trait]
impl Scanner for BleCentral {
    async fn scan(&self, target: &str, window: Duration) -> Result<Vec<Advertisement>, ArmError> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| adapter_err("start scan", e))?;

        let deadline = Instant::now() + window;
        let result = loop {
            let seen = match self.advertisements().await {
                Ok(seen) => seen,
                Err(e) => break Err(e),
            };
            let hit = seen.iter().any(|(ad, _)| ad.name.as_deref() == Some(target));
            if hit || Instant::now() >= deadline {
                break Ok(seen.into_iter().map(|(ad, _)| ad).collect());
            }
            tokio::time::sleep(SCAN_POLL.min(deadline.saturating_duration_since(Instant::now()))).await;
        };

        if let Err(e) = self.adapter.stop_scan().await {
            warn!(error = %e, "failed to stop scan");
        }
        result
    }
}

#[async_trait]
impl Connector for BleCentral {
    async fn connect(&self, handle: &PeripheralHandle) -> Result<Box<dyn Link>, ArmError> {
        let connect_err = |details: String| ArmError::Connect {
            peripheral: handle.to_string(),
            details,
        };
        let peripheral = self
            .find(&handle.address)
            .await?
            .ok_or_else(|| connect_err("peripheral is no longer visible".to_string()))?;

        peripheral.connect().await.map_err(|e| connect_err(e.to_string()))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| connect_err(format!("service discovery: {e}")))?;

        let tx = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == UART_TX_CHAR && c.service_uuid == UART_SERVICE);
        let Some(tx) = tx else {
            if let Err(e) = peripheral.disconnect().await {
                warn!(error = %e, "disconnect after failed discovery");
            }
            return Err(connect_err("UART TX characteristic not found".to_string()));
        };
        debug!(peripheral = %handle, characteristic = %tx.uuid, "UART TX characteristic ready");
        Ok(Box::new(BleLink { peripheral, tx }))
    }
}

/// A connected arm and its TX characteristic.
pub struct BleLink {
    peripheral: Peripheral,
    tx: Characteristic,
}

#[async_trait]
impl Link for BleLink {
    async fn write(&self, payload: &[u8]) -> Result<(), ArmError> {
        self.peripheral
            .write(&self.tx, payload, WriteType::WithoutResponse)
            .await
            .map_err(|e| adapter_err("gatt write", e))
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<(), ArmError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| adapter_err("disconnect", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uart_uuids_match_nordic_layout() {
        assert_eq!(
            UART_SERVICE.to_string(),
            "6e400001-b5a3-f393-e0a9-e50e24dcca9e"
        );
        assert_eq!(
            UART_TX_CHAR.to_string(),
            "6e400002-b5a3-f393-e0a9-e50e24dcca9e"
        );
    }
}
