use std::fmt::{Display, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::{
    ChannelClosed, ConnectionRefused, Error, InvalidThreshold, NotConnected, Unknown,
};
use crate::io::{ChangeHandler, Connection, VoltageRatioIo};

#[derive(Debug, Default)]
struct MockSensorState {
    connected: bool,
    opened: bool,
    trigger: f64,
    ratio: f64,
    handlers: Vec<ChangeHandler>,
}

/// Mock implementation of [`VoltageRatioIo`]: a simulated pedal sensor.
///
/// It emulates the hardware change trigger: a change event is delivered only when the channel is
/// opened and the simulated ratio moved by at least the configured trigger since the last event.
#[derive(Clone, Debug, Default)]
pub struct MockVoltageRatioInput {
    /// Makes the `connect()` step fail.
    pub refuse_connection: bool,
    /// Makes the `open()` step fail.
    pub refuse_channel: bool,
    /// Makes the `disconnect()` step fail.
    pub refuse_disconnect: bool,
    /// Keeps the registered handlers when the channel is closed (as some hardware SDKs do).
    pub retain_handlers: bool,
    state: Arc<RwLock<MockSensorState>>,
}

impl MockVoltageRatioInput {
    /// Creates a sensor whose board refuses the connection.
    pub fn unreachable() -> Self {
        Self {
            refuse_connection: true,
            ..Default::default()
        }
    }

    /// Creates a sensor whose board refuses to open the channel.
    pub fn closed_channel() -> Self {
        Self {
            refuse_channel: true,
            ..Default::default()
        }
    }

    /// Creates a sensor keeping its change handlers across close/open cycles.
    pub fn retaining_handlers() -> Self {
        Self {
            retain_handlers: true,
            ..Default::default()
        }
    }

    /// Simulates a new voltage ratio read by the hardware.
    ///
    /// # Return
    /// `true` if a change event has been delivered to the registered handlers.
    pub fn simulate_ratio(&self, ratio: f64) -> bool {
        let handlers = {
            let mut state = self.state.write();
            if !state.opened || (ratio - state.ratio).abs() < state.trigger {
                return false;
            }
            state.ratio = ratio;
            state.handlers.clone()
        };
        // Handlers are called outside the lock: they may read the sensor back.
        handlers.iter().for_each(|handler| handler.call(ratio));
        true
    }

    /// Simulates `count` magnet passes by swinging the ratio between 0 and 1.
    ///
    /// # Return
    /// The number of change events actually delivered.
    pub fn simulate_changes(&self, count: usize) -> usize {
        (0..count)
            .filter(|_| {
                let next = if self.state.read().ratio < 0.5 { 1.0 } else { 0.0 };
                self.simulate_ratio(next)
            })
            .count()
    }

    /// Returns the configured change trigger.
    pub fn get_trigger(&self) -> f64 {
        self.state.read().trigger
    }
}

impl Display for MockVoltageRatioInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        write!(
            f,
            "{} [connected={}, opened={}, ratio={}]",
            self.get_name(),
            state.connected,
            state.opened,
            state.ratio,
        )
    }
}

impl VoltageRatioIo for MockVoltageRatioInput {
    fn connect(&mut self, connection: &Connection) -> Result<(), Error> {
        if self.refuse_connection {
            return Err(Error::from(ConnectionRefused {
                address: connection.to_string(),
                info: String::from("simulated refusal"),
            }));
        }
        self.state.write().connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), Error> {
        if self.refuse_disconnect {
            return Err(Unknown {
                info: String::from("simulated disconnection failure"),
            });
        }
        let mut state = self.state.write();
        state.opened = false;
        state.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.read().connected
    }

    fn on_change(&mut self, handler: ChangeHandler) -> Result<(), Error> {
        let mut state = self.state.write();
        if !state.connected {
            return Err(Error::from(NotConnected));
        }
        state.handlers.push(handler);
        Ok(())
    }

    fn open(&mut self) -> Result<(), Error> {
        let mut state = self.state.write();
        if !state.connected {
            return Err(Error::from(NotConnected));
        }
        if self.refuse_channel {
            return Err(Error::from(ChannelClosed));
        }
        state.opened = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        let mut state = self.state.write();
        state.opened = false;
        if !self.retain_handlers {
            state.handlers.clear();
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.read().opened
    }

    fn set_change_trigger(&mut self, threshold: f64) -> Result<(), Error> {
        let mut state = self.state.write();
        if !state.opened {
            return Err(Error::from(ChannelClosed));
        }
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::from(InvalidThreshold { threshold }));
        }
        state.trigger = threshold;
        Ok(())
    }

    fn get_ratio(&self) -> Result<f64, Error> {
        let state = self.state.read();
        match state.opened {
            true => Ok(state.ratio),
            false => Err(Error::from(ChannelClosed)),
        }
    }
}
