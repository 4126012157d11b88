use std::fmt;

use super::error::RecordStoreError;

/// External store of recorded driving data.
///
/// Only the erase operation is used here: the erase button drops the last N
/// records (typically the seconds before a crash).
pub trait RecordStore: Send + Sync + fmt::Debug {
    fn delete_last_n_records(&self, n: usize) -> Result<(), RecordStoreError>;
}
