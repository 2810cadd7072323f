#![doc(html_root_url = "https://docs.rs/pedal-power/0.1.0")]

//! <h1 align="center">PEDAL-POWER - Turn pedal rotations into energy</h1>
//! <div style="text-align:center;font-style:italic;">Pedal-Power counts the laps ridden on a sensor-equipped pedal and stores them into a battery - written in Rust.</div>
//! <br/>
//!
//! # Features
//!
//! - Accumulate energy in an in-memory [`Battery`](devices::Battery).
//! - Count pedal rotations with a [`Pedal`](devices::Pedal) watching a voltage-ratio sensor
//!   through a [`VoltageRatioIo`](io::VoltageRatioIo) capability (a magnet passing by the sensor twice a lap).
//! - Periodically transfer the ridden laps into the battery with a [`Bike`](hardware::Bike).
//!
//! # Getting Started
//!
//! - Add the following to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! pedal-power = "0.1.0"
//! ```
//!
//! - Plug your sensor driver by implementing [`VoltageRatioIo`](io::VoltageRatioIo) (or use the
//!   simulated sensor from the `mocks` feature), then ride:
//! ```ignore
//! use pedal_power::hardware::{Bike, BikeEvent};
//! use pedal_power::mocks::MockVoltageRatioInput;
//!
//! #[pedal_power::runtime]
//! async fn main() {
//!     let sensor = MockVoltageRatioInput::default();
//!
//!     // Transfers the ridden laps into the battery every 500ms.
//!     let bike = Bike::run(sensor.clone());
//!
//!     bike.on(BikeEvent::OnTick, |energy: f64| async move {
//!         println!("Energy fed: {}", energy);
//!         Ok(())
//!     });
//! }
//! ```
//!
//! # Feature flags
//!
//! - **serde** -- Enables serialize/deserialize capabilities for the battery and the connection settings.
//! - **mocks** -- Provides a simulated sensor (useful for tests and demos mostly).

// Lets `#[pedal_power::runtime]` expand to the same paths inside and outside the crate.
extern crate self as pedal_power;

pub mod devices;
pub mod errors;
pub mod hardware;
pub mod io;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod utils;

pub use pedal_macros::runtime;
