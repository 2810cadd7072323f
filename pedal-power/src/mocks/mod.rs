//! Mocked entities, useful for tests and simulated rides.

mod voltage_ratio;

pub use voltage_ratio::MockVoltageRatioInput;
