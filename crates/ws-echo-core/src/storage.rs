//! Persistent storage initialization.
//!
//! The WiFi driver keeps its calibration data and credentials in the
//! key-value store, so it must be up before the network. A partition that
//! was truncated or written by a newer format is erased and initialized
//! once more; anything else is fatal.

use std::fmt;

use log::{info, warn};
use thiserror::Error;

use crate::LOG_TARGET;

/// Result of a storage init attempt that did not hard-fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    /// Storage is usable.
    Ready,
    /// The partition is full or has an incompatible layout and must be erased.
    NeedsErase,
}

/// Platform key-value storage (NVS flash on ESP32).
pub trait StorageBackend {
    /// Error raised by the storage driver.
    type Error: fmt::Debug + fmt::Display;

    /// Initialize the partition.
    fn init(&mut self) -> Result<StorageStatus, Self::Error>;

    /// Erase the whole partition.
    fn erase(&mut self) -> Result<(), Self::Error>;
}

/// Errors that halt the boot.
#[derive(Debug, Error)]
pub enum StorageError<E> {
    /// Initialization failed outright.
    #[error("storage init failed: {0}")]
    Init(E),

    /// Erasing an incompatible partition failed.
    #[error("storage erase failed: {0}")]
    Erase(E),

    /// The partition still needs an erase after being erased.
    #[error("storage still incompatible after erase")]
    StillIncompatible,
}

/// Bring storage up, erasing and retrying once if the partition is stale.
pub fn init_storage<B: StorageBackend>(backend: &mut B) -> Result<(), StorageError<B::Error>> {
    match backend.init().map_err(StorageError::Init)? {
        StorageStatus::Ready => {
            info!(target: LOG_TARGET, "Storage initialized");
            Ok(())
        }
        StorageStatus::NeedsErase => {
            warn!(target: LOG_TARGET, "Storage partition needs to be erased");
            backend.erase().map_err(StorageError::Erase)?;
            match backend.init().map_err(StorageError::Init)? {
                StorageStatus::Ready => {
                    info!(target: LOG_TARGET, "Storage initialized after erase");
                    Ok(())
                }
                StorageStatus::NeedsErase => Err(StorageError::StillIncompatible),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    /// Storage returning scripted init results and recording calls.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedStorage {
        pub(crate) init_results: VecDeque<Result<StorageStatus, i32>>,
        pub(crate) erase_result: Option<i32>,
        pub(crate) calls: Vec<&'static str>,
    }

    impl ScriptedStorage {
        pub(crate) fn new(results: impl IntoIterator<Item = Result<StorageStatus, i32>>) -> Self {
            Self {
                init_results: results.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    impl StorageBackend for ScriptedStorage {
        type Error = i32;

        fn init(&mut self) -> Result<StorageStatus, i32> {
            self.calls.push("init");
            self.init_results.pop_front().unwrap_or(Ok(StorageStatus::Ready))
        }

        fn erase(&mut self) -> Result<(), i32> {
            self.calls.push("erase");
            match self.erase_result {
                Some(code) => Err(code),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn test_ready_first_time() {
        let mut storage = ScriptedStorage::new([Ok(StorageStatus::Ready)]);
        init_storage(&mut storage).unwrap();
        assert_eq!(storage.calls, vec!["init"]);
    }

    #[test]
    fn test_needs_erase_erases_once_and_retries() {
        let mut storage =
            ScriptedStorage::new([Ok(StorageStatus::NeedsErase), Ok(StorageStatus::Ready)]);
        init_storage(&mut storage).unwrap();
        assert_eq!(storage.calls, vec!["init", "erase", "init"]);
    }

    #[test]
    fn test_other_failure_is_fatal() {
        let mut storage = ScriptedStorage::new([Err(0x101)]);
        let err = init_storage(&mut storage).unwrap_err();
        assert!(matches!(err, StorageError::Init(0x101)));
        assert_eq!(storage.calls, vec!["init"]);
    }

    #[test]
    fn test_erase_failure_is_fatal() {
        let mut storage = ScriptedStorage::new([Ok(StorageStatus::NeedsErase)]);
        storage.erase_result = Some(-1);
        let err = init_storage(&mut storage).unwrap_err();
        assert!(matches!(err, StorageError::Erase(-1)));
    }

    #[test]
    fn test_second_needs_erase_is_not_retried() {
        let mut storage =
            ScriptedStorage::new([Ok(StorageStatus::NeedsErase), Ok(StorageStatus::NeedsErase)]);
        let err = init_storage(&mut storage).unwrap_err();
        assert!(matches!(err, StorageError::StillIncompatible));
        assert_eq!(storage.calls, vec!["init", "erase", "init"]);
    }
}
