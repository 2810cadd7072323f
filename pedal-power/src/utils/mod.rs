#[cfg(any(test, feature = "mocks"))]
pub use serial_test;
pub use tokio;

pub use events::{EventHandler, EventManager};
pub use task::TaskHandler;

pub mod events;
pub mod task;

/// (De)serializes an `Arc<RwLock<T>>` as its inner value.
#[cfg(feature = "serde")]
pub(crate) mod arc_rwlock_serde {
    use std::sync::Arc;

    use parking_lot::RwLock;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Arc<RwLock<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        T::serialize(&*value.read(), serializer)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Arc<RwLock<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Arc::new(RwLock::new(T::deserialize(deserializer)?)))
    }
}
