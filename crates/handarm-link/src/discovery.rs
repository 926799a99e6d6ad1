//! Peripheral Discovery – one-shot scan for the arm by advertised name.
//!
//! [`discover`] runs a single scan through a [`Scanner`] and picks the first
//! advertisement whose name matches exactly.  It never retries: whether to
//! try again is the caller's decision.  Not finding the arm is an ordinary
//! outcome ([`Discovery::NotFound`]), not an error.

use std::time::Duration;

use async_trait::async_trait;
use handarm_types::{ArmError, PeripheralHandle};
use tracing::{info, warn};

/// One advertising device seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Advertised local name, if the device broadcasts one.
    pub name: Option<String>,
    /// Backend-specific identifier used later to connect.
    pub address: String,
}

/// A radio that can list advertising devices.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan for up to `window` and return every device seen.
    ///
    /// Implementations may return early once a device named `target` has
    /// been seen.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Adapter`] when the radio cannot scan at all.
    async fn scan(&self, target: &str, window: Duration) -> Result<Vec<Advertisement>, ArmError>;
}

/// Outcome of a discovery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Found(PeripheralHandle),
    NotFound,
}

/// Scan once and match `expected_name` exactly against advertised names.
///
/// # Errors
///
/// Propagates scanner failures; a scan that completes without a match is
/// `Ok(Discovery::NotFound)`.
pub async fn discover(
    scanner: &dyn Scanner,
    expected_name: &str,
    timeout: Duration,
) -> Result<Discovery, ArmError> {
    info!(name = expected_name, timeout_ms = timeout.as_millis() as u64, "scanning for arm");
    let seen = scanner.scan(expected_name, timeout).await?;
    let found = seen
        .into_iter()
        .find(|ad| ad.name.as_deref() == Some(expected_name))
        .map(|ad| PeripheralHandle {
            name: expected_name.to_string(),
            address: ad.address,
        });

    match found {
        Some(handle) => {
            info!(peripheral = %handle, "found robotic arm");
            Ok(Discovery::Found(handle))
        }
        None => {
            warn!(name = expected_name, "couldn't find robotic arm");
            Ok(Discovery::NotFound)
        }
    }
}
