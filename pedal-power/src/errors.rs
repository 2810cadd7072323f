use snafu::Snafu;

pub use crate::errors::Error::*;
pub use crate::errors::SensorError::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Runtime error: Are you sure your code runs inside #[pedal_power::runtime]?
    RuntimeError,
    /// Sensor error: {source}.
    SensorError { source: SensorError },
    /// Unknown error: {info}.
    Unknown { info: String },
}

impl From<SensorError> for Error {
    fn from(value: SensorError) -> Self {
        Self::SensorError { source: value }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SensorError {
    /// Connection to {address} refused - {info}
    ConnectionRefused { address: String, info: String },
    /// Connection has not been initialized
    NotConnected,
    /// Sensor channel is not opened
    ChannelClosed,
    /// Change trigger ({threshold}) must be within ]0, 1]
    InvalidThreshold { threshold: f64 },
}
