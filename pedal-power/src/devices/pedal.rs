use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{error, trace};
use parking_lot::{Mutex, RwLock};

use crate::errors::{Error, InvalidThreshold};
use crate::io::{ChangeHandler, Connection, VoltageRatioIo};
use crate::utils::task;
use crate::utils::{EventHandler, EventManager, TaskHandler};

/// Default minimum voltage ratio delta required to fire a change event.
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Number of change events (rising + falling transition) per full pedal rotation.
const CHANGES_PER_LAP: f64 = 2.0;

/// Lists all events a Pedal can emit/listen.
pub enum PedalEvent {
    /// Triggered when the sensor is connected, opened and configured.
    OnReady,
    /// Triggered when the sensor channel is closed (gracefully).
    OnClose,
}

/// Convert events to string to facilitate usage with [`EventManager`].
impl From<PedalEvent> for String {
    fn from(value: PedalEvent) -> Self {
        let event = match value {
            PedalEvent::OnReady => "ready",
            PedalEvent::OnClose => "close",
        };
        event.into()
    }
}

/// Represents a pedal whose rotation is detected by a voltage-ratio sensor (a magnet passing by a
/// hall-effect sensor for instance).
///
/// Each magnet pass triggers two change events on the sensor (rising then falling ratio): a lap is
/// therefore counted every two change events.
#[derive(Clone, Debug)]
pub struct Pedal {
    // ########################################
    // # Basics
    /// Where the sensor interface board is reached.
    connection: Connection,
    /// The minimum voltage ratio delta required to fire a change event.
    threshold: f64,
    /// Number of change events received since the pedal was attached.
    total_variation: Arc<AtomicU64>,
    /// The `total_variation` value observed during the last `laps_since_last_read()` call.
    last_read_variation: Arc<Mutex<u64>>,
    /// Identifies the current attachment: change handlers from a previous one do not count.
    session: Arc<AtomicU64>,

    // ########################################
    // # Volatile utility data.
    sensor: Box<dyn VoltageRatioIo>,
    /// Inner handler to the task running the sensor setup.
    handler: Arc<RwLock<Option<TaskHandler>>>,
    /// The event manager for the pedal.
    events: EventManager,
}

impl Pedal {
    /// Creates a pedal reading the given sensor.
    ///
    /// The sensor is reached on `localhost:8989` with a change trigger of `0.05` by default.
    ///
    /// **_/!\ No change is counted until the pedal is opened with [`Pedal::open`]._**
    pub fn new<S: VoltageRatioIo + 'static>(sensor: S) -> Self {
        Self {
            connection: Connection::default(),
            threshold: DEFAULT_THRESHOLD,
            total_variation: Arc::new(AtomicU64::new(0)),
            last_read_variation: Arc::new(Mutex::new(0)),
            session: Arc::new(AtomicU64::new(0)),
            sensor: Box::new(sensor),
            handler: Arc::new(RwLock::new(None)),
            events: Default::default(),
        }
    }

    /// Sets where the sensor interface board is reached.
    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connection = connection;
        self
    }

    /// Sets the minimum voltage ratio delta required to fire a change event.
    ///
    /// # Errors
    /// * `InvalidThreshold`: the threshold must be within ]0, 1] (a voltage ratio ranges from 0 to 1).
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self, Error> {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::from(InvalidThreshold { threshold }));
        }
        self.threshold = threshold;
        Ok(self)
    }

    /// Starts the sensor setup procedure in an asynchronous way.
    ///
    /// Any failure during the setup is logged and the sensor channel is closed: the pedal then
    /// never counts any lap. No error can escape from this method.
    /// _Note: after this method, you cannot consider the pedal to be counting until you receive the "ready" event._
    ///
    /// # Example
    /// ```ignore
    /// use pedal_power::devices::{Pedal, PedalEvent};
    /// use pedal_power::mocks::MockVoltageRatioInput;
    ///
    /// #[pedal_power::runtime]
    /// async fn main() {
    ///     let pedal = Pedal::new(MockVoltageRatioInput::default()).open();
    ///     pedal.on(PedalEvent::OnReady, |pedal: Pedal| async move {
    ///         println!("Pedal ready: {}", pedal);
    ///         Ok(())
    ///     });
    /// }
    /// ```
    pub fn open(self) -> Self {
        let events = self.events.clone();
        let mut callback_pedal = self.clone();

        let handler = task::run(async move {
            match callback_pedal.blocking_attach() {
                Ok(()) => events.emit(PedalEvent::OnReady, callback_pedal),
                Err(err) => error!("Pedal sensor setup failed: {}", err),
            }
        });

        match handler {
            Ok(handler) => *self.handler.write() = Some(handler),
            Err(err) => error!("Pedal sensor setup could not start: {}", err),
        }

        self
    }

    /// Blocking version of [`Self::open()`] method: runs the setup sequence and returns its failure.
    ///
    /// Setup sequence:
    /// 1. connects the session to the sensor interface board,
    /// 2. registers the change handler,
    /// 3. opens the sensor channel,
    /// 4. configures the change trigger.
    ///
    /// On failure, the sensor channel is closed.
    /// Attaching an already attached pedal does nothing.
    pub fn blocking_attach(&mut self) -> Result<(), Error> {
        if self.is_attached() {
            trace!("Pedal sensor already attached");
            return Ok(());
        }
        let result = self.setup_sensor();
        if result.is_err() {
            if let Err(err) = self.sensor.close() {
                error!("Pedal sensor could not be closed: {}", err);
            }
        }
        result
    }

    fn setup_sensor(&mut self) -> Result<(), Error> {
        self.sensor.connect(&self.connection)?;
        trace!("Pedal sensor connected to {}", self.connection);

        // Sensors may keep the handlers of a previous attachment: only the latest one counts.
        let session = self.session.fetch_add(1, Ordering::SeqCst) + 1;
        let current_session = self.session.clone();
        let total_variation = self.total_variation.clone();
        self.sensor.on_change(ChangeHandler::new(move |ratio| {
            if current_session.load(Ordering::SeqCst) != session {
                return;
            }
            let count = total_variation.fetch_add(1, Ordering::SeqCst) + 1;
            trace!("Pedal change #{} (ratio={})", count, ratio);
        }))?;

        self.sensor.open()?;
        trace!("Pedal sensor channel opened");

        self.sensor.set_change_trigger(self.threshold)?;
        trace!("Pedal sensor change trigger set to {}", self.threshold);
        Ok(())
    }

    /// Closes the sensor channel and session: the pedal stops counting laps.
    pub fn detach(&mut self) -> Result<(), Error> {
        if let Some(handler) = self.handler.write().take() {
            handler.abort();
        }
        self.session.fetch_add(1, Ordering::SeqCst);
        self.sensor.close()?;
        self.sensor.disconnect()?;
        trace!("Pedal sensor detached");
        self.events.emit(PedalEvent::OnClose, self.clone());
        Ok(())
    }

    /// Registers a callback to be executed on a given event.
    ///
    /// Available events for a pedal are defined by the enum: [`PedalEvent`]:
    /// - **`OnReady` | `ready`:** Triggered when the sensor is configured and counting.
    ///   _The callback must receive the following parameter: `|_: Pedal| { ... }`_
    /// - **`OnClose` | `close`:** Triggered when the pedal is detached.
    ///   _The callback must receive the following parameter: `|_: Pedal| { ... }`_
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
    // Lap reading.

    /// Returns the number of laps ridden since the pedal was attached.
    ///
    /// Laps have a half-lap granularity: an odd number of change events gives a fractional lap.
    pub fn laps(&self) -> f64 {
        self.total_variation.load(Ordering::SeqCst) as f64 / CHANGES_PER_LAP
    }

    /// Returns the number of laps ridden since the previous call, and moves the reading reference
    /// to now. Two successive calls without any change in between return 0 the second time.
    pub fn laps_since_last_read(&self) -> f64 {
        let mut last_read = self.last_read_variation.lock();
        let total = self.total_variation.load(Ordering::SeqCst);
        let delta = total.saturating_sub(*last_read);
        *last_read = total;
        delta as f64 / CHANGES_PER_LAP
    }

    // ########################################
    // Setters and Getters.

    /// Returns the number of change events received since the pedal was attached.
    pub fn get_total_variation(&self) -> u64 {
        self.total_variation.load(Ordering::SeqCst)
    }

    pub fn get_threshold(&self) -> f64 {
        self.threshold
    }

    pub fn get_connection(&self) -> &Connection {
        &self.connection
    }

    /// Reads the current voltage ratio on the sensor.
    pub fn get_ratio(&self) -> Result<f64, Error> {
        self.sensor.get_ratio()
    }

    /// Indicates if the sensor channel is opened (ie. the pedal is counting).
    pub fn is_attached(&self) -> bool {
        self.sensor.is_open()
    }
}

impl Display for Pedal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pedal ({}) [laps={}, threshold={}]",
            self.sensor,
            self.laps(),
            self.threshold,
        )
    }
}
