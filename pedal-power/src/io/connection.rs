use std::fmt::{Display, Formatter};

/// Network parameters used to reach the sensor interface board.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    /// The host serving the sensor interface.
    host: String,
    /// The port serving the sensor interface.
    port: u16,
}

impl Connection {
    /// Creates a connection description for a given host and port.
    ///
    /// # Example
    /// ```
    /// use pedal_power::io::Connection;
    ///
    /// let connection = Connection::new("192.168.1.20", 5661);
    /// assert_eq!(connection.to_string(), "192.168.1.20:5661");
    /// ```
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn get_host(&self) -> &str {
        &self.host
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }
}

impl Default for Connection {
    /// Sensor interface served on `localhost:8989`.
    fn default() -> Self {
        Self::new("localhost", 8989)
    }
}

impl Display for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
