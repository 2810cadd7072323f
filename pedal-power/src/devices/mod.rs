//! Defines the devices a bike is made of.

mod battery;
mod pedal;

pub use battery::Battery;
pub use pedal::{Pedal, PedalEvent, DEFAULT_THRESHOLD};
