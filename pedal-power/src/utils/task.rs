//! Defines Pedal-Power Runtime task runner.
use std::future::Future;

use log::error;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use crate::errors::{Error, RuntimeError, Unknown};

/// Represents the result of a task.
/// A task may return either () or Result<(), Error> for flexibility which
/// will be converted to TaskResult sent to the runtime.
pub enum TaskResult {
    Ok,
    Err(Error),
}

/// Represents a handler for a running task: can be used to abort it.
pub type TaskHandler = JoinHandle<Result<(), Error>>;

type TaskResultReceiver = UnboundedReceiver<TaskResult>;

/// Globally accessible runtime transmitter(TX)/receiver(RX) (not initialised yet)
static RUNTIME_TX: OnceCell<Mutex<Option<UnboundedSender<TaskResultReceiver>>>> =
    OnceCell::const_new();
static RUNTIME_RX: OnceCell<tokio::sync::Mutex<Option<UnboundedReceiver<TaskResultReceiver>>>> =
    OnceCell::const_new();

impl From<Result<(), Error>> for TaskResult {
    fn from(result: Result<(), Error>) -> Self {
        match result {
            Ok(_) => TaskResult::Ok,
            Err(e) => TaskResult::Err(e),
        }
    }
}

impl From<()> for TaskResult {
    fn from(_: ()) -> Self {
        TaskResult::Ok
    }
}

/// Initializes the channel used by the runtime to follow the spawned tasks.
///
/// _You most likely don't need this function: it is called by `#[pedal_power::runtime]`._
pub async fn init_task_channel() {
    RUNTIME_RX
        .get_or_init(|| async {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<TaskResultReceiver>();

            RUNTIME_TX
                .get_or_init(|| async { Mutex::new(Some(tx)) })
                .await;

            tokio::sync::Mutex::new(Some(rx))
        })
        .await;
}

/// Waits for every task spawned with [`run`] (including the ones spawned meanwhile) to be done.
///
/// Failed tasks are logged but do not interrupt the wait.
///
/// _You most likely don't need this function: it is called by `#[pedal_power::runtime]`._
pub async fn wait_for_tasks() {
    let Some(cell) = RUNTIME_RX.get() else {
        return;
    };
    let mut lock = cell.lock().await;
    let Some(receiver) = lock.as_mut() else {
        return;
    };

    // A task registers its own sub-tasks before being done: they are queued before we get its result.
    while let Ok(mut task_receiver) = receiver.try_recv() {
        // An aborted task drops its sender: no result is received.
        if let Some(TaskResult::Err(err)) = task_receiver.recv().await {
            error!("Task failed: {}", err);
        }
    }
}

/// Runs a given future as a Tokio task while ensuring the main function (marked by `#[pedal_power::runtime]`)
/// will not finish before all tasks running are done.
/// This is done by using a globally accessible channel to communicate the handlers to be waited by the
/// runtime.
///
/// # Parameters
/// * `future`: A future that implements `Future<Output = ()>` or `Future<Output = Result<(), Error>>`,
///   `Send`, and has a `'static` lifetime.
///
/// # Errors
/// * `RuntimeError`: if no tokio runtime runs, or if the runtime channel has not been initialized.
///
/// # Example
/// ```
/// use pedal_power::utils::task;
///
/// #[pedal_power::runtime]
/// async fn main() {
///     task::run(async move {
///         // whatever
///     }).unwrap();
/// }
/// ```
pub fn run<F, T>(future: F) -> Result<TaskHandler, Error>
where
    F: Future<Output = T> + Send + 'static,
    T: Into<TaskResult> + Send + 'static,
{
    let runtime = Handle::try_current().map_err(|_| RuntimeError)?;
    let cell = RUNTIME_TX.get().ok_or(RuntimeError)?;

    // Create a transmitter(tx)/receiver(rx) unique to this task.
    let (task_tx, task_rx) = tokio::sync::mpsc::unbounded_channel();

    // Send the receiver(rx) side of the task-channel to the runtime.
    {
        let mut lock = cell.lock();
        let runtime_tx = lock.as_mut().ok_or(RuntimeError)?;
        runtime_tx.send(task_rx).map_err(|err| Unknown {
            info: err.to_string(),
        })?;
    }

    // Run the future and send its result through the task channel.
    let handler = runtime.spawn(async move {
        let result = future.await.into();
        task_tx.send(result).map_err(|err| Unknown {
            info: err.to_string(),
        })?;
        Ok::<(), Error>(())
    });

    Ok(handler)
}

#[macro_export]
macro_rules! pause {
    ($ms:expr) => {
        $crate::utils::tokio::time::sleep($crate::utils::tokio::time::Duration::from_millis(
            $ms as u64,
        ))
        .await
    };
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use std::time::SystemTime;

    use crate::errors::{Error, Unknown};
    use crate::utils::task;

    #[pedal_macros::runtime]
    async fn my_runtime() -> Result<(), Error> {
        task::run(async move {
            pause!(500);
            task::run(async move {
                pause!(100);
                task::run(async move {
                    pause!(100);
                })?;
                Ok::<(), Error>(())
            })?;
            Ok::<(), Error>(())
        })?;

        task::run(async move {
            pause!(500);
        })?;

        task::run(async move {
            pause!(500);
        })?;

        Ok(())
    }

    #[test]
    #[serial_test::serial]
    fn test_task_parallel_execution() {
        // Tasks should be parallel and function should be blocked until all done.
        // Therefore the `my_runtime()` function should take more time than the longest task, but less
        // than the sum of task times.
        let start = SystemTime::now();
        my_runtime().unwrap();
        let end = SystemTime::now();

        let duration = end.duration_since(start).unwrap().as_millis();
        assert!(
            duration >= 700,
            "Duration should be greater than 700ms (found: {})",
            duration,
        );
        assert!(
            duration < 1500,
            "Duration should be lower than 1500ms (found: {})",
            duration,
        );
    }

    #[test]
    fn test_task_outside_runtime() {
        let result = task::run(async move {});
        assert!(result.is_err(), "No task can run without a runtime");
        assert_eq!(
            result.unwrap_err().to_string(),
            "Runtime error: Are you sure your code runs inside #[pedal_power::runtime]?"
        );
    }

    #[pedal_macros::test]
    async fn test_task_abort_execution() {
        let flag = Arc::new(AtomicU8::new(0));
        let flag_clone = flag.clone();

        // Increment the flag after 100ms
        task::run(async move {
            pause!(100);
            flag_clone.fetch_add(1, Ordering::SeqCst);
        })
        .expect("Should not panic");

        // The flag should not have been incremented before the 100ms elapsed.
        pause!(50);
        assert_eq!(
            flag.load(Ordering::SeqCst),
            0,
            "Flag should not be updated by the task before 100ms",
        );

        // The flag should have been incremented after the 100ms elapsed.
        pause!(100);
        assert_eq!(
            flag.load(Ordering::SeqCst),
            1,
            "Flag should be updated by the task after 100ms",
        );

        // ######################
        // Same test but aborting
        let flag_clone = flag.clone();

        let handler = task::run(async move {
            pause!(100);
            flag_clone.fetch_add(1, Ordering::SeqCst);
        })
        .expect("Should not panic");

        pause!(50);
        assert_eq!(
            flag.load(Ordering::SeqCst),
            1,
            "Flag should not be updated by the task before 100ms",
        );

        // Abort the task
        handler.abort();

        // The flag should not have been incremented after the 100ms elapsed.
        pause!(100);
        assert_eq!(
            flag.load(Ordering::SeqCst),
            1,
            "Flag should not be updated by an aborted task",
        );
    }

    #[pedal_macros::test]
    async fn test_task_with_result() {
        let task = task::run(async move { Ok::<(), Error>(()) });

        assert!(task.is_ok(), "An Ok(()) task do not panic the runtime");

        let task = task::run(async move {
            Err::<(), Error>(Unknown {
                info: "wow panic!".to_string(),
            })
        });

        assert!(task.is_ok(), "A failing task do not panic the runtime");
    }
}
