//! `handarm-link` – the radio side of the controller.
//!
//! Finds the arm, holds the connection, and writes wire tokens to it.
//!
//! # Modules
//!
//! - [`discovery`] – one-shot scan that matches the arm by advertised name.
//! - [`session`] – connection lifecycle: open, send, liveness, idempotent
//!   close.  Defines the [`Link`] / [`Connector`] transport seams and the
//!   [`CommandSink`] view handed to the dispatcher.
//! - [`ble`] – `btleplug` backend writing to the UART TX characteristic.
//! - [`sim`] – in-process backend that feeds a simulated arm.

pub mod ble;
pub mod discovery;
pub mod session;
pub mod sim;

pub use ble::{BleCentral, UART_SERVICE, UART_TX_CHAR};
pub use discovery::{Advertisement, Discovery, Scanner, discover};
pub use session::{CommandSink, Connector, Link, Session};
pub use sim::{SIM_ADDRESS, SimCentral, SimLink};
