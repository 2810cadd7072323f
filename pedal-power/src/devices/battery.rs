use std::fmt::{Display, Formatter};
use std::sync::Arc;

use parking_lot::RwLock;

/// Represents an in-memory energy accumulator.
///
/// Energy is unit-less: one lap ridden on the [`Pedal`](crate::devices::Pedal) is one energy unit.
/// No bound is enforced: consuming more than what was fed leaves the battery in debt (negative).
///
/// Clones share the same accumulator.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct Battery {
    /// The energy currently stored.
    #[cfg_attr(feature = "serde", serde(with = "crate::utils::arc_rwlock_serde"))]
    energy: Arc<RwLock<f64>>,
}

impl Battery {
    /// Creates an empty battery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial energy stored in the battery.
    pub fn with_energy(self, energy: f64) -> Self {
        *self.energy.write() = energy;
        self
    }

    /// Adds `amount` to the stored energy.
    pub fn feed(&self, amount: f64) {
        *self.energy.write() += amount;
    }

    /// Removes `amount` from the stored energy: the result may be negative.
    pub fn consume(&self, amount: f64) {
        *self.energy.write() -= amount;
    }

    /// Returns the energy currently stored.
    pub fn total(&self) -> f64 {
        *self.energy.read()
    }
}

impl Display for Battery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Battery [energy={}]", self.total())
    }
}


#[cfg(feature = "serde")]
#[cfg(test)]
mod serde_tests {
    use crate::devices::Battery;

    #[test]
    fn test_battery_serialize() {
        let battery = Battery::new().with_energy(4.5);
        let json = serde_json::to_string(&battery).unwrap();
        assert_eq!(json, r#"{"energy":4.5}"#);
    }

    #[test]
    fn test_battery_deserialize() {
        let battery: Battery = serde_json::from_str(r#"{"energy":-1.5}"#).unwrap();
        assert_eq!(battery.total(), -1.5);
    }
}
