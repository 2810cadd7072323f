use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, trace};
use parking_lot::RwLock;
use tokio::time::MissedTickBehavior;

use crate::devices::{Battery, Pedal};
use crate::errors::Error;
use crate::io::VoltageRatioIo;
use crate::utils::task;
use crate::utils::{EventHandler, EventManager, TaskHandler};

/// Default period (in ms) between two transfers of laps into the battery.
pub const DEFAULT_INTERVAL: u64 = 500;

/// Lists all events a Bike can emit/listen.
pub enum BikeEvent {
    /// Triggered on each tick, once the ridden laps have been fed to the battery.
    OnTick,
    /// Triggered when the bike is stopped.
    OnStop,
}

/// Convert events to string to facilitate usage with [`EventManager`].
impl From<BikeEvent> for String {
    fn from(value: BikeEvent) -> Self {
        let event = match value {
            BikeEvent::OnTick => "tick",
            BikeEvent::OnStop => "stop",
        };
        event.into()
    }
}

/// Represents a bike: a [`Pedal`] charging a [`Battery`].
///
/// Once started, the bike periodically transfers the laps ridden on its pedal since the previous
/// transfer into its battery (one lap is one energy unit).
#[derive(Clone, Debug)]
pub struct Bike {
    /// Period (in ms) between two transfers.
    interval: u64,
    pedal: Pedal,
    battery: Battery,

    // ########################################
    // # Volatile utility data.
    /// Inner handler to the task running the transfer ticker.
    handler: Arc<RwLock<Option<TaskHandler>>>,
    /// The event manager for the bike.
    events: EventManager,
}

impl Bike {
    /// Creates and starts a bike reading the given sensor with default settings.
    ///
    /// # Example
    /// ```ignore
    /// use pedal_power::hardware::Bike;
    /// use pedal_power::mocks::MockVoltageRatioInput;
    ///
    /// #[pedal_power::runtime]
    /// async fn main() {
    ///     // Following lines are all equivalent:
    ///     let mut bike = Bike::run(MockVoltageRatioInput::default());
    ///     # bike.stop().unwrap();
    ///     let mut bike = Bike::new(MockVoltageRatioInput::default()).start();
    ///     # bike.stop().unwrap();
    /// }
    /// ```
    pub fn run<S: VoltageRatioIo + 'static>(sensor: S) -> Self {
        Self::new(sensor).start()
    }

    /// Creates a bike reading the given sensor: an empty battery and a pedal with default settings.
    ///
    /// **_/!\ Nothing is counted until the bike is started with [`Bike::start`]._**
    pub fn new<S: VoltageRatioIo + 'static>(sensor: S) -> Self {
        Self::from(Pedal::new(sensor))
    }

    /// Sets the period (in ms) between two transfers of laps into the battery.
    /// The change applies at the next start.
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Sets the battery charged by the bike.
    pub fn with_battery(mut self, battery: Battery) -> Self {
        self.battery = battery;
        self
    }

    /// Opens the pedal (asynchronously, unless already attached) and starts the transfer ticker.
    /// Starting an already running bike does nothing.
    ///
    /// A pedal failing to open is logged only: the bike keeps ticking but no energy is accrued.
    pub fn start(mut self) -> Self {
        if self.is_running() {
            return self;
        }

        if !self.pedal.is_attached() {
            self.pedal = self.pedal.open();
        }

        let bike = self.clone();
        let period = Duration::from_millis(self.interval);
        let handler = task::run(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                bike.tick();
            }
            #[allow(unreachable_code)]
            Ok::<(), Error>(())
        });

        match handler {
            Ok(handler) => {
                trace!("Bike started (interval={}ms)", self.interval);
                *self.handler.write() = Some(handler);
            }
            Err(err) => error!("Bike ticker could not start: {}", err),
        }

        self
    }

    /// Stops the transfer ticker and detaches the pedal.
    ///
    /// The bike is stopped (and the "stop" event emitted) even if the pedal fails to detach:
    /// that failure is returned.
    pub fn stop(&mut self) -> Result<(), Error> {
        if let Some(handler) = self.handler.write().take() {
            handler.abort();
        }
        let detached = self.pedal.detach();
        if let Err(err) = &detached {
            error!("Bike pedal could not be detached: {}", err);
        }
        trace!("Bike stopped: {}", self);
        self.events.emit(BikeEvent::OnStop, self.clone());
        detached
    }

    /// Transfers the laps ridden since the previous transfer into the battery.
    ///
    /// # Return
    /// The amount of energy fed to the battery.
    pub fn tick(&self) -> f64 {
        let laps = self.pedal.laps_since_last_read();
        self.battery.feed(laps);
        debug!("Bike fed {} to the battery (total={})", laps, self.battery.total());
        self.events.emit(BikeEvent::OnTick, laps);
        laps
    }

    /// Registers a callback to be executed on a given event.
    ///
    /// Available events for a bike are defined by the enum: [`BikeEvent`]:
    /// - **`OnTick` | `tick`:** Triggered on each transfer.
    ///   _The callback must receive the following parameter: `|energy: f64| { ... }`_
    /// - **`OnStop` | `stop`:** Triggered when the bike is stopped.
    ///   _The callback must receive the following parameter: `|_: Bike| { ... }`_
    ///
    /// # Example
    /// ```ignore
    /// use pedal_power::hardware::{Bike, BikeEvent};
    /// use pedal_power::mocks::MockVoltageRatioInput;
    ///
    /// #[pedal_power::runtime]
    /// async fn main() {
    ///     let bike = Bike::run(MockVoltageRatioInput::default());
    ///     bike.on(BikeEvent::OnTick, |energy: f64| async move {
    ///         println!("Energy fed: {}", energy);
    ///         Ok(())
    ///     });
    ///     # bike.clone().stop().unwrap();
    /// }
    /// ```
    pub fn on<S, F, T, Fut>(&self, event: S, callback: F) -> EventHandler
    where
        S: Into<String>,
        T: 'static + Send + Sync + Clone,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.events.on(event, callback)
    }

    // ########################################
    // Setters and Getters.

    /// Indicates if the transfer ticker runs.
    pub fn is_running(&self) -> bool {
        self.handler
            .read()
            .as_ref()
            .is_some_and(|handler| !handler.is_finished())
    }

    pub fn get_interval(&self) -> u64 {
        self.interval
    }

    pub fn get_pedal(&self) -> &Pedal {
        &self.pedal
    }

    pub fn get_battery(&self) -> &Battery {
        &self.battery
    }
}

/// Creates a (stopped) bike around the given pedal with an empty battery.
///
/// # Example
/// ```ignore
/// use pedal_power::devices::Pedal;
/// use pedal_power::hardware::Bike;
/// use pedal_power::io::Connection;
/// use pedal_power::mocks::MockVoltageRatioInput;
///
/// #[pedal_power::runtime]
/// async fn main() {
///     let pedal = Pedal::new(MockVoltageRatioInput::default())
///         .with_connection(Connection::new("192.168.1.20", 5661))
///         .with_threshold(0.1)
///         .unwrap();
///     let mut bike = Bike::from(pedal).with_interval(100).start();
///     # bike.stop().unwrap();
/// }
/// ```
impl From<Pedal> for Bike {
    fn from(pedal: Pedal) -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            pedal,
            battery: Battery::new(),
            handler: Arc::new(RwLock::new(None)),
            events: Default::default(),
        }
    }
}

impl Display for Bike {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bike (interval={}ms) [laps={}, energy={}]",
            self.interval,
            self.pedal.laps(),
            self.battery.total(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use super::*;
    use crate::mocks::MockVoltageRatioInput;
    use crate::pause;

    fn attached_bike() -> (Bike, MockVoltageRatioInput) {
        let sensor = MockVoltageRatioInput::default();
        let mut pedal = Pedal::new(sensor.clone());
        pedal.blocking_attach().unwrap();
        (Bike::from(pedal), sensor)
    }

    #[test]
    fn test_bike_new() {
        let bike = Bike::new(MockVoltageRatioInput::default());
        assert_eq!(bike.get_interval(), 500);
        assert_eq!(bike.get_battery().total(), 0.0);
        assert_eq!(bike.get_pedal().get_threshold(), 0.05);
        assert!(!bike.is_running());

        let bike = Bike::new(MockVoltageRatioInput::default())
            .with_interval(100)
            .with_battery(Battery::new().with_energy(3.0));
        assert_eq!(bike.get_interval(), 100);
        assert_eq!(bike.get_battery().total(), 3.0);

        let bike = Bike::new(MockVoltageRatioInput::default()).with_interval(0);
        assert_eq!(bike.get_interval(), 1);
    }

    #[test]
    fn test_bike_tick() {
        let (bike, sensor) = attached_bike();
        sensor.simulate_changes(10);
        assert_eq!(bike.tick(), 5.0);
        assert_eq!(bike.get_battery().total(), 5.0, "10 changes are 5 laps");

        // Nothing ridden since the last tick.
        assert_eq!(bike.tick(), 0.0);
        assert_eq!(bike.get_battery().total(), 5.0);

        sensor.simulate_changes(3);
        assert_eq!(bike.tick(), 1.5);
        assert_eq!(bike.get_battery().total(), 6.5);
    }

    #[test]
    fn test_bike_tick_keeps_battery_debt() {
        let (bike, sensor) = attached_bike();
        bike.get_battery().consume(2.0);
        sensor.simulate_changes(2);
        bike.tick();
        assert_eq!(bike.get_battery().total(), -1.0);
    }

    #[test]
    fn test_bike_display() {
        let (bike, sensor) = attached_bike();
        sensor.simulate_changes(4);
        bike.tick();
        assert_eq!(
            format!("{}", bike),
            "Bike (interval=500ms) [laps=2, energy=2]"
        );
    }

    #[pedal_macros::test]
    async fn test_bike_run() {
        let sensor = MockVoltageRatioInput::default();
        let mut bike = Bike::new(sensor.clone()).with_interval(100).start();
        assert!(bike.is_running());

        // Let the pedal be opened.
        pause!(50);
        assert!(bike.get_pedal().is_attached());
        assert_eq!(sensor.simulate_changes(10), 10);

        pause!(120);
        assert_eq!(bike.get_battery().total(), 5.0);

        bike.stop().unwrap();
        assert!(!bike.is_running());
        assert!(!bike.get_pedal().is_attached());
    }

    #[pedal_macros::test]
    async fn test_bike_events() {
        let ticks = Arc::new(AtomicU64::new(0));
        let moved_ticks = ticks.clone();
        let stopped = Arc::new(AtomicBool::new(false));
        let moved_stopped = stopped.clone();

        let sensor = MockVoltageRatioInput::default();
        let mut bike = Bike::new(sensor.clone()).with_interval(100).start();
        bike.on(BikeEvent::OnTick, move |energy: f64| {
            let captured_ticks = moved_ticks.clone();
            async move {
                if energy > 0.0 {
                    captured_ticks.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
        });
        bike.on(BikeEvent::OnStop, move |bike: Bike| {
            let captured_stopped = moved_stopped.clone();
            async move {
                captured_stopped.store(!bike.is_running(), Ordering::SeqCst);
                Ok(())
            }
        });

        pause!(50);
        sensor.simulate_changes(2);
        pause!(120);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        bike.stop().unwrap();
        pause!(50);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[pedal_macros::test]
    async fn test_bike_stop() {
        let sensor = MockVoltageRatioInput::default();
        let mut bike = Bike::run(sensor.clone());
        pause!(50);
        sensor.simulate_changes(4);
        bike.stop().unwrap();
        assert_eq!(bike.tick(), 2.0, "Laps ridden before the stop remain readable");

        // Nothing is counted nor fed once stopped.
        assert_eq!(sensor.simulate_changes(4), 0);
        pause!(600);
        assert_eq!(bike.get_battery().total(), 2.0);
    }

    #[pedal_macros::test]
    async fn test_bike_with_attached_pedal() {
        let sensor = MockVoltageRatioInput::default();
        let mut pedal = Pedal::new(sensor.clone());
        pedal.blocking_attach().unwrap();
        let mut bike = Bike::from(pedal).with_interval(100).start();

        pause!(50);
        assert_eq!(sensor.simulate_changes(10), 10);
        assert_eq!(bike.get_pedal().get_total_variation(), 10);
        pause!(100);
        assert_eq!(bike.get_battery().total(), 5.0, "10 changes are 5 laps");
        bike.stop().unwrap();
    }

    #[pedal_macros::test]
    async fn test_bike_with_opening_pedal() {
        let sensor = MockVoltageRatioInput::default();
        let mut bike = Bike::from(Pedal::new(sensor.clone()).open())
            .with_interval(100)
            .start();

        pause!(50);
        assert_eq!(sensor.simulate_changes(10), 10);
        pause!(100);
        assert_eq!(bike.get_battery().total(), 5.0, "10 changes are 5 laps");
        bike.stop().unwrap();
    }

    #[pedal_macros::test]
    async fn test_bike_restart() {
        let sensor = MockVoltageRatioInput::retaining_handlers();
        let mut bike = Bike::new(sensor.clone()).with_interval(100).start();
        pause!(50);
        sensor.simulate_changes(2);
        bike.stop().unwrap();
        assert_eq!(bike.tick(), 1.0);

        let mut bike = bike.start();
        pause!(50);
        assert!(bike.get_pedal().is_attached());
        sensor.simulate_changes(10);
        pause!(100);
        assert_eq!(bike.get_battery().total(), 6.0, "Each change is counted once");
        bike.stop().unwrap();
    }

    #[pedal_macros::test]
    async fn test_bike_stop_detach_failure() {
        let stopped = Arc::new(AtomicBool::new(false));
        let moved_stopped = stopped.clone();

        let mut sensor = MockVoltageRatioInput::default();
        sensor.refuse_disconnect = true;
        let mut bike = Bike::new(sensor.clone()).with_interval(100).start();
        bike.on(BikeEvent::OnStop, move |_: Bike| {
            let captured_stopped = moved_stopped.clone();
            async move {
                captured_stopped.store(true, Ordering::SeqCst);
                Ok(())
            }
        });
        pause!(50);

        assert!(bike.stop().is_err());
        assert!(!bike.is_running());
        pause!(50);
        assert!(stopped.load(Ordering::SeqCst), "The stop event is emitted anyway");
    }

    #[pedal_macros::test]
    async fn test_bike_connection_refused() {
        let sensor = MockVoltageRatioInput::unreachable();
        let mut bike = Bike::new(sensor.clone()).with_interval(50).start();

        pause!(25);
        assert!(!bike.get_pedal().is_attached());
        assert_eq!(sensor.simulate_changes(10), 0);

        pause!(150);
        assert!(bike.is_running(), "The ticker keeps running");
        assert_eq!(bike.get_battery().total(), 0.0);
        bike.stop().unwrap();
    }
}
