//! In-process radio backed by a [`SimPeripheral`].
//!
//! [`SimCentral`] plays both roles a real adapter plays: it answers scans
//! with the peripheral's advertisement and opens [`SimLink`]s that deliver
//! every write straight into the simulated firmware.  Fault knobs let tests
//! and dry runs exercise the unhappy paths without hardware.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use handarm_hal::peripheral::SimPeripheral;
use handarm_types::{ArmError, PeripheralHandle};
use tracing::debug;

use crate::discovery::{Advertisement, Scanner};
use crate::session::{Connector, Link};

/// Address the simulated peripheral advertises under.
pub const SIM_ADDRESS: &str = "sim:00:00:00:00:00";

#[derive(Debug, Default)]
struct Faults {
    hidden: AtomicBool,
    refuse_connect: AtomicBool,
    /// Every Nth write fails when non-zero.
    fail_every: AtomicU64,
    /// The link drops after this many writes when non-zero.
    drop_after: AtomicU64,
}

#[derive(Debug, Default)]
struct Counters {
    scans: AtomicU32,
    connects: AtomicU32,
    disconnects: AtomicU32,
    writes: AtomicU64,
}

/// Simulated central adapter.  Cloning shares the peripheral and counters.
#[derive(Clone)]
pub struct SimCentral {
    peripheral: Arc<Mutex<SimPeripheral>>,
    faults: Arc<Faults>,
    counters: Arc<Counters>,
}

impl SimCentral {
    pub fn new(peripheral: SimPeripheral) -> Self {
        Self {
            peripheral: Arc::new(Mutex::new(peripheral)),
            faults: Arc::new(Faults::default()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Stop (or resume) advertising.
    pub fn set_advertising(&self, on: bool) {
        self.faults.hidden.store(!on, Ordering::SeqCst);
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.faults.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// Make every `n`th write fail.  `0` disables the fault.
    pub fn fail_every(&self, n: u64) {
        self.faults.fail_every.store(n, Ordering::SeqCst);
    }

    /// Drop the link once `n` writes have been delivered.  `0` disables it.
    pub fn drop_after(&self, n: u64) {
        self.faults.drop_after.store(n, Ordering::SeqCst);
    }

    /// Run `f` against the simulated firmware.
    pub fn with_peripheral<T>(&self, f: impl FnOnce(&SimPeripheral) -> T) -> Result<T, ArmError> {
        let guard = self
            .peripheral
            .lock()
            .map_err(|_| ArmError::Adapter("simulated peripheral lock poisoned".to_string()))?;
        Ok(f(&guard))
    }

    pub fn scans(&self) -> u32 {
        self.counters.scans.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> u32 {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> u32 {
        self.counters.disconnects.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u64 {
        self.counters.writes.load(Ordering::SeqCst)
    }

    fn advertised_name(&self) -> Result<String, ArmError> {
        self.with_peripheral(|p| p.name().to_string())
    }
}

#[async_trait]
impl Scanner for SimCentral {
    async fn scan(&self, target: &str, window: Duration) -> Result<Vec<Advertisement>, ArmError> {
        self.counters.scans.fetch_add(1, Ordering::SeqCst);
        let mut seen = vec![Advertisement {
            name: None,
            address: "sim:ff:ff:ff:ff:ff".to_string(),
        }];
        if self.faults.hidden.load(Ordering::SeqCst) {
            // Nothing answers; the full window elapses.
            tokio::time::sleep(window).await;
            return Ok(seen);
        }
        let name = self.advertised_name()?;
        debug!(target, advertised = %name, "simulated scan");
        seen.push(Advertisement {
            name: Some(name),
            address: SIM_ADDRESS.to_string(),
        });
        Ok(seen)
    }
}

#[async_trait]
impl Connector for SimCentral {
    async fn connect(&self, handle: &PeripheralHandle) -> Result<Box<dyn Link>, ArmError> {
        if handle.address != SIM_ADDRESS || self.faults.refuse_connect.load(Ordering::SeqCst) {
            return Err(ArmError::Connect {
                peripheral: handle.to_string(),
                details: "peripheral did not accept the connection".to_string(),
            });
        }
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SimLink {
            central: self.clone(),
            up: AtomicBool::new(true),
        }))
    }
}

/// One simulated connection.
pub struct SimLink {
    central: SimCentral,
    up: AtomicBool,
}

#[async_trait]
impl Link for SimLink {
    async fn write(&self, payload: &[u8]) -> Result<(), ArmError> {
        if !self.up.load(Ordering::SeqCst) {
            return Err(ArmError::Adapter("not connected".to_string()));
        }
        let n = self.central.counters.writes.fetch_add(1, Ordering::SeqCst) + 1;
        let fail_every = self.central.faults.fail_every.load(Ordering::SeqCst);
        if fail_every != 0 && n % fail_every == 0 {
            return Err(ArmError::Adapter(format!("injected write fault on write {n}")));
        }
        {
            let mut peripheral = self
                .central
                .peripheral
                .lock()
                .map_err(|_| ArmError::Adapter("simulated peripheral lock poisoned".to_string()))?;
            // Firmware rejections are logged there; the host never learns of them.
            let _ = peripheral.receive(payload);
        }
        let drop_after = self.central.faults.drop_after.load(Ordering::SeqCst);
        if drop_after != 0 && n >= drop_after {
            self.up.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), ArmError> {
        self.up.store(false, Ordering::SeqCst);
        self.central.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
