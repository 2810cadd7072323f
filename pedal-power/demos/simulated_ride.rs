//! Demonstrates a short ride on a simulated pedal sensor: the laps are fed to the battery every 500ms.

use pedal_power::devices::Battery;
use pedal_power::errors::Error;
use pedal_power::hardware::{Bike, BikeEvent};
use pedal_power::mocks::MockVoltageRatioInput;
use pedal_power::pause;
use pedal_power::utils::task;

#[pedal_power::runtime]
async fn main() {
    let sensor = MockVoltageRatioInput::default();
    let battery = Battery::new();

    let mut bike = Bike::new(sensor.clone())
        .with_battery(battery.clone())
        .start();

    // Triggered function each time the laps are transferred.
    bike.on(BikeEvent::OnTick, |energy: f64| async move {
        println!("Energy fed: {}", energy);
        Ok(())
    });

    bike.on(BikeEvent::OnStop, |bike: Bike| async move {
        println!("Ride over: {}", bike);
        Ok(())
    });

    // Rides a lap every 100ms (two sensor changes each).
    let rider = task::run(async move {
        for _ in 0..30 {
            pause!(100);
            sensor.simulate_changes(2);
        }
        Ok::<(), Error>(())
    })
    .unwrap();

    let _ = rider.await;
    pause!(600);

    bike.stop().unwrap();
    println!("Battery: {}", battery);
}
