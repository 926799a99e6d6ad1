//! Connection Session – lifecycle of one link to the arm.
//!
//! A [`Session`] is opened from a [`PeripheralHandle`] through a
//! [`Connector`], exposes [`Session::send`] and [`Session::is_connected`],
//! and is released with [`Session::close`].
//!
//! # Guarantees
//!
//! * Writes never interleave: each `send` holds the write lock for the
//!   duration of one token, so concurrent callers hit the wire in lock
//!   order.
//! * A failed `send` does not change the [`ConnectionState`]; only an
//!   observed link loss or `close` does.
//! * `close` releases the link exactly once, however many times and from
//!   however many tasks it is called, and waits for any in-flight write.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use handarm_types::{ArmError, ChannelIdFormat, ConnectionState, PeripheralHandle, WireCommand};
use tracing::{debug, info, instrument, warn};

// ────────────────────────────────────────────────────────────────────────────
// Transport seams
// ────────────────────────────────────────────────────────────────────────────

/// An established transport-level connection.
#[async_trait]
pub trait Link: Send + Sync {
    /// Write one payload.  No response is awaited.
    async fn write(&self, payload: &[u8]) -> Result<(), ArmError>;

    /// Cheap liveness probe.
    async fn is_connected(&self) -> bool;

    /// Tear the connection down.
    async fn disconnect(&self) -> Result<(), ArmError>;
}

/// Opens [`Link`]s to discovered peripherals.
#[async_trait]
pub trait Connector: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ArmError::Connect`] when the peripheral is unreachable or
    /// refuses the connection.
    async fn connect(&self, handle: &PeripheralHandle) -> Result<Box<dyn Link>, ArmError>;
}

/// The send-capable view of a session handed to the command dispatcher.
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn is_connected(&self) -> bool;
    async fn send(&self, command: WireCommand) -> Result<(), ArmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

pub struct Session {
    handle: PeripheralHandle,
    format: ChannelIdFormat,
    link: Box<dyn Link>,
    state: Mutex<ConnectionState>,
    write_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
}

impl Session {
    /// Connect to `handle`.  Tokens on this session use `format` for its
    /// whole lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Connect`] when the connector fails.
    #[instrument(name = "session_open", skip_all, fields(peripheral = %handle, format = %format))]
    pub async fn open(
        connector: &dyn Connector,
        handle: PeripheralHandle,
        format: ChannelIdFormat,
    ) -> Result<Self, ArmError> {
        info!(peripheral = %handle, state = %ConnectionState::Connecting, "connection state");
        let link = match connector.connect(&handle).await {
            Ok(link) => link,
            Err(e) => {
                warn!(peripheral = %handle, state = %ConnectionState::Disconnected, error = %e, "connection state");
                return Err(match e {
                    ArmError::Connect { .. } => e,
                    other => ArmError::Connect {
                        peripheral: handle.to_string(),
                        details: other.to_string(),
                    },
                });
            }
        };
        info!(peripheral = %handle, state = %ConnectionState::Connected, format = %format, "connection state");
        Ok(Self {
            handle,
            format,
            link,
            state: Mutex::new(ConnectionState::Connected),
            write_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> &PeripheralHandle {
        &self.handle
    }

    pub fn format(&self) -> ChannelIdFormat {
        self.format
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().map(|s| *s).unwrap_or(ConnectionState::Disconnected)
    }

    /// Write one command.
    ///
    /// # Errors
    ///
    /// [`ArmError::SessionClosed`] after close or link loss;
    /// [`ArmError::Send`] when the write itself fails.
    pub async fn send(&self, command: WireCommand) -> Result<(), ArmError> {
        if self.closed.load(Ordering::Acquire) || self.state().is_terminal() {
            return Err(ArmError::SessionClosed);
        }
        let token = command.encode(self.format);
        let _guard = self.write_lock.lock().await;
        // close() may have won the lock race.
        if self.closed.load(Ordering::Acquire) {
            return Err(ArmError::SessionClosed);
        }
        self.link
            .write(token.as_bytes())
            .await
            .map_err(|e| ArmError::Send {
                channel: command.channel,
                details: e.to_string(),
            })?;
        debug!(token = %token, "sent");
        Ok(())
    }

    /// `true` while the link is up.  Observing a dead link moves the session
    /// to the terminal `Disconnected` state.
    pub async fn is_connected(&self) -> bool {
        if self.closed.load(Ordering::Acquire) || self.state().is_terminal() {
            return false;
        }
        if self.link.is_connected().await {
            return true;
        }
        if self.set_state(ConnectionState::Disconnected) != ConnectionState::Disconnected {
            warn!(peripheral = %self.handle, state = %ConnectionState::Disconnected, "link lost");
        }
        false
    }

    /// Release the link.  Returns `true` for the call that actually released
    /// it and `false` for every later (or concurrent) call.
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Wait for an in-flight write to resolve before tearing down.
        let _guard = self.write_lock.lock().await;
        self.set_state(ConnectionState::Disconnected);
        if let Err(e) = self.link.disconnect().await {
            warn!(peripheral = %self.handle, error = %e, "disconnect failed");
        }
        info!(peripheral = %self.handle, state = %ConnectionState::Disconnected, "session closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Store `next` and return the previous state.
    fn set_state(&self, next: ConnectionState) -> ConnectionState {
        match self.state.lock() {
            Ok(mut state) => std::mem::replace(&mut *state, next),
            Err(_) => ConnectionState::Disconnected,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            warn!(peripheral = %self.handle, "session dropped without close");
        }
    }
}

#[async_trait]
impl CommandSink for Session {
    async fn is_connected(&self) -> bool {
        Session::is_connected(self).await
    }

    async fn send(&self, command: WireCommand) -> Result<(), ArmError> {
        Session::send(self, command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handarm_types::JointChannel;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    #[derive(Default)]
    struct Probe {
        written: Mutex<Vec<String>>,
        disconnects: AtomicU32,
        dead: AtomicBool,
        fail_writes: AtomicBool,
    }

    struct ProbeLink(Arc<Probe>);

    #[async_trait]
    impl Link for ProbeLink {
        async fn write(&self, payload: &[u8]) -> Result<(), ArmError> {
            if self.0.fail_writes.load(Ordering::SeqCst) {
                return Err(ArmError::Adapter("gatt write failed".to_string()));
            }
            self.0
                .written
                .lock()
                .unwrap()
                .push(String::from_utf8(payload.to_vec()).unwrap());
            tokio::task::yield_now().await;
            Ok(())
        }

        async fn is_connected(&self) -> bool {
            !self.0.dead.load(Ordering::SeqCst)
        }

        async fn disconnect(&self) -> Result<(), ArmError> {
            self.0.disconnects.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(())
        }
    }

    struct ProbeConnector {
        probe: Arc<Probe>,
        refuse: bool,
    }

    #[async_trait]
    impl Connector for ProbeConnector {
        async fn connect(&self, handle: &PeripheralHandle) -> Result<Box<dyn Link>, ArmError> {
            if self.refuse {
                return Err(ArmError::Adapter(format!("{} refused", handle.name)));
            }
            Ok(Box::new(ProbeLink(Arc::clone(&self.probe))))
        }
    }

    fn handle() -> PeripheralHandle {
        PeripheralHandle {
            name: "mpy-uart".to_string(),
            address: "sim".to_string(),
        }
    }

    async fn open(format: ChannelIdFormat) -> (Session, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let connector = ProbeConnector {
            probe: Arc::clone(&probe),
            refuse: false,
        };
        let session = Session::open(&connector, handle(), format).await.unwrap();
        (session, probe)
    }

    #[tokio::test]
    async fn open_reaches_connected() {
        let (session, _probe) = open(ChannelIdFormat::Name).await;
        assert_eq!(session.state(), ConnectionState::Connected);
        assert!(session.is_connected().await);
        session.close().await;
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let connector = ProbeConnector {
            probe: Arc::new(Probe::default()),
            refuse: true,
        };
        let result = Session::open(&connector, handle(), ChannelIdFormat::Name).await;
        assert!(matches!(result, Err(ArmError::Connect { .. })));
    }

    #[tokio::test]
    async fn send_uses_session_format() {
        let (session, probe) = open(ChannelIdFormat::Index).await;
        session.send(WireCommand::new(JointChannel::Top, 52230)).await.unwrap();
        assert_eq!(*probe.written.lock().unwrap(), vec!["3:52230".to_string()]);
        session.close().await;
    }

    #[tokio::test]
    async fn failed_send_keeps_state() {
        let (session, probe) = open(ChannelIdFormat::Name).await;
        probe.fail_writes.store(true, Ordering::SeqCst);
        let err = session.send(WireCommand::new(JointChannel::Base, 1)).await.unwrap_err();
        assert!(matches!(err, ArmError::Send { channel: JointChannel::Base, .. }));
        assert_eq!(session.state(), ConnectionState::Connected);

        probe.fail_writes.store(false, Ordering::SeqCst);
        session.send(WireCommand::new(JointChannel::Base, 2)).await.unwrap();
        session.close().await;
    }

    #[tokio::test]
    async fn link_loss_is_terminal() {
        let (session, probe) = open(ChannelIdFormat::Name).await;
        probe.dead.store(true, Ordering::SeqCst);
        assert!(!session.is_connected().await);
        assert_eq!(session.state(), ConnectionState::Disconnected);

        // The link coming back does not revive the session.
        probe.dead.store(false, Ordering::SeqCst);
        assert!(!session.is_connected().await);
        assert!(matches!(
            session.send(WireCommand::new(JointChannel::Base, 1)).await,
            Err(ArmError::SessionClosed)
        ));
        session.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (session, probe) = open(ChannelIdFormat::Name).await;
        assert!(session.close().await);
        assert!(!session.close().await);
        assert_eq!(probe.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert!(!session.is_connected().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_close_releases_once() {
        let (session, probe) = open(ChannelIdFormat::Name).await;
        let session = Arc::new(session);
        let a = tokio::spawn({
            let s = Arc::clone(&session);
            async move { s.close().await }
        });
        let b = tokio::spawn({
            let s = Arc::clone(&session);
            async move { s.close().await }
        });
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a ^ b, "exactly one close call performs the release");
        assert_eq!(probe.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn send_after_close_is_rejected() {
        let (session, probe) = open(ChannelIdFormat::Name).await;
        session.close().await;
        let result = session.send(WireCommand::new(JointChannel::Hand, 0)).await;
        assert!(matches!(result, Err(ArmError::SessionClosed)));
        assert!(probe.written.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sends_do_not_interleave() {
        let (session, probe) = open(ChannelIdFormat::Name).await;
        let session = Arc::new(session);
        let mut tasks = Vec::new();
        for i in 0..20u16 {
            let s = Arc::clone(&session);
            tasks.push(tokio::spawn(async move {
                s.send(WireCommand::new(JointChannel::Middle, i)).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        let written = probe.written.lock().unwrap().clone();
        assert_eq!(written.len(), 20);
        assert!(written.iter().all(|t| t.starts_with("middle:")));
        session.close().await;
    }
}
