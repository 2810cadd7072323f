//! Defines the capability a sensor interface board must offer to feed a [`Pedal`](crate::devices::Pedal).
//!
//! The concrete transport (network server, USB, etc.) lives out of this crate: anything that
//! implements [`VoltageRatioIo`] can be plugged in.

mod connection;

use std::any::type_name;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use dyn_clone::DynClone;

pub use connection::Connection;

use crate::errors::Error;

// Makes a Box<dyn VoltageRatioIo> clone (used for Pedal cloning).
dyn_clone::clone_trait_object!(VoltageRatioIo);

/// Callback invoked by the sensor each time the voltage ratio changes by at least the configured
/// change trigger. The parameter is the new voltage ratio (0 to 1).
///
/// The callback may be invoked from any thread owned by the sensor implementation.
#[derive(Clone)]
pub struct ChangeHandler(Arc<dyn Fn(f64) + Send + Sync>);

impl ChangeHandler {
    pub fn new<F: Fn(f64) + Send + Sync + 'static>(callback: F) -> Self {
        Self(Arc::new(callback))
    }

    /// Invokes the callback with the new `ratio`.
    pub fn call(&self, ratio: f64) {
        (self.0)(ratio)
    }
}

impl Debug for ChangeHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChangeHandler")
    }
}

/// Defines the trait all voltage-ratio sensor interfaces must implement.
///
/// Implementations are expected to share their inner state between clones: a cloned sensor
/// refers to the same hardware channel.
pub trait VoltageRatioIo: DynClone + Send + Sync + Debug + Display {
    /// Returns the sensor interface name (used for Display only)
    fn get_name(&self) -> &'static str {
        type_name::<Self>().split("::").last().unwrap_or("VoltageRatioIo")
    }

    // ########################################
    // Session related functions.

    /// Opens the session with the sensor interface board.
    ///
    /// # Notes
    /// The method is sync and may block until the connection is established.
    fn connect(&mut self, connection: &Connection) -> Result<(), Error>;
    /// Gracefully shuts down the session.
    fn disconnect(&mut self) -> Result<(), Error>;
    /// Checks if the session is opened.
    fn is_connected(&self) -> bool;

    // ########################################
    // Channel related functions.

    /// Registers the `handler` to be called on each voltage ratio change.
    fn on_change(&mut self, handler: ChangeHandler) -> Result<(), Error>;
    /// Opens the voltage ratio input channel: change events start being delivered.
    fn open(&mut self) -> Result<(), Error>;
    /// Closes the voltage ratio input channel: no more change events are delivered.
    fn close(&mut self) -> Result<(), Error>;
    /// Checks if the voltage ratio input channel is opened.
    fn is_open(&self) -> bool;
    /// Sets the minimum voltage ratio delta required to fire a change event.
    fn set_change_trigger(&mut self, threshold: f64) -> Result<(), Error>;
    /// Reads the current voltage ratio.
    fn get_ratio(&self) -> Result<f64, Error>;
}
