//! Defines Pedal-Power event manager system.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use log::warn;
use parking_lot::Mutex;

use crate::errors::Error;
use crate::utils::task;

type SyncedCallbackMap = Mutex<HashMap<String, Vec<CallbackWrapper>>>;
pub type EventHandler = usize;

#[derive(Clone, Default)]
pub struct EventManager {
    callbacks: Arc<SyncedCallbackMap>,
    next_id: Arc<AtomicUsize>,
}

type BoxedCallback =
    Box<dyn FnMut(Arc<dyn Any + Send + Sync>) -> BoxFuture<'static, Result<(), Error>> + Send>;

struct CallbackWrapper {
    id: EventHandler,
    callback: BoxedCallback,
}

impl EventManager {
    /// Register event handler for a specific event name.
    ///
    /// # Parameters
    /// * `event` - The event name (any type that matches an Into<String>)
    /// * `callback` - An async moved callback that accepts a single parameter as an argument.
    ///   The argument can be anything that might be both `Send + Sync`.
    ///   You can trick multiple parameters by turning them in a single tuple.
    ///
    /// # Return
    /// Returns an EventHandler that can be used by the `unregister()` method.
    ///
    /// # Errors
    /// If the event handler does not match the expected emitted event exactly it will fail silently.
    /// That means if the parameter given in the callback does not exactly match the emitted one
    /// no handler will be called.
    ///
    /// # Example
    ///
    /// ```
    /// use pedal_power::utils::EventManager;
    ///
    /// #[pedal_power::runtime]
    /// async fn main() {
    ///     let events: EventManager = Default::default();
    ///
    ///     // Register various handlers for the same event.
    ///     events.on("tick", |energy: f64| async move {
    ///         println!("Energy fed: {}", energy);
    ///         Ok(())
    ///     });
    ///     events.on("tick", |(name, laps): (String, f64)| async move {
    ///         println!("{} rode {} laps", name, laps);
    ///         Ok(())
    ///     });
    ///
    ///     // Only the first handler matches this payload.
    ///     events.emit("tick", 1.5);
    /// }
    /// ```
    pub fn on<S, F, T, Fut>(&self, event: S, mut callback: F) -> EventHandler
    where
        S: Into<String>,
        T: 'static + Send + Sync + Clone,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let event_name = event.into();
        let callback_event = event_name.clone();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // Boxes the callback and downcast its parameter.
        let boxed_callback: BoxedCallback = Box::new(move |arg: Arc<dyn Any + Send + Sync>| {
            match arg.downcast::<T>() {
                Ok(arg) => callback((*arg).clone()).boxed(),
                Err(_) => {
                    warn!(
                        "The callback for event '{}' could not be called because parameter does not match",
                        callback_event
                    );
                    Box::pin(async { Ok(()) })
                }
            }
        });

        self.callbacks
            .lock()
            .entry(event_name)
            .or_default()
            .push(CallbackWrapper {
                id,
                callback: boxed_callback,
            });

        id
    }

    /// Invoke all event handlers registered for a specific event name.
    /// Each matching handler runs as its own task (see [`task::run`]).
    /// Only the callback registered by the `on()` method and whose payload matches the declared
    /// callback type will be called. All others will be silently skipped.
    ///
    /// # Parameters
    /// * `event`:  The event name (any type that matches an `Into<String>`)
    /// * `payload`: The event payload (must be `'static + Send + Sync`)
    pub fn emit<S, T>(&self, event: S, payload: T)
    where
        S: Into<String>,
        T: 'static + Send + Sync,
    {
        let event_name = event.into();
        let payload_any: Arc<dyn Any + Send + Sync> = Arc::new(payload);
        if let Some(callbacks) = self.callbacks.lock().get_mut(&event_name) {
            for wrapper in callbacks.iter_mut() {
                let future = (wrapper.callback)(payload_any.clone());
                if let Err(err) = task::run(future) {
                    warn!("Event '{}' handler could not run: {}", event_name, err);
                }
            }
        }
    }

    /// Unregister a given handler if found.
    pub fn unregister(&self, handler: EventHandler) {
        self.callbacks
            .lock()
            .values_mut()
            .for_each(|v| v.retain(|cb| cb.id != handler));
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count: usize = self.callbacks.lock().values().map(Vec::len).sum();
        write!(f, "EventManager [callbacks={}]", count)
    }
}
