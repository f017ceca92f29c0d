//! Transaction error type for tenant-scoped transactions.
//!
//! Lets a closure's own error type travel through the transaction helper
//! without being flattened into a storage error.

use std::fmt;

use crate::StoreError;

/// Transaction error that distinguishes closure errors from infrastructure errors.
#[derive(Debug)]
pub enum TxError<E> {
    /// Error returned by the transaction closure. The transaction was rolled back.
    Domain(E),
    /// Failure to open, bind, or commit the transaction.
    Infra(StoreError),
}

impl<E> TxError<E> {
    /// Collapse into the closure's error type.
    pub fn into_domain<F>(self, map_infra: F) -> E
    where
        F: FnOnce(StoreError) -> E,
    {
        match self {
            TxError::Domain(e) => e,
            TxError::Infra(infra) => map_infra(infra),
        }
    }
}

impl<E: fmt::Display> fmt::Display for TxError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxError::Domain(e) => write!(f, "{e}"),
            TxError::Infra(e) => write!(f, "infrastructure error: {e}"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for TxError<E> {}
