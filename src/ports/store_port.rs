//! History persistence port.

use crate::domain::error::NavsyncError;
use crate::domain::store::Store;

pub trait StorePort {
    /// Read the persisted store. `Ok(None)` means nothing has been written yet;
    /// an unreadable or corrupt store is an error.
    fn load(&self) -> Result<Option<Store>, NavsyncError>;

    /// Replace the persisted store with `store` in one step.
    fn commit(&self, store: &Store) -> Result<(), NavsyncError>;

    fn location(&self) -> String;
}
