//! Defines the assembled pieces of hardware: a bike made of a pedal and a battery.

mod bike;

pub use bike::{Bike, BikeEvent, DEFAULT_INTERVAL};
