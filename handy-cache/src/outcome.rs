//! Tagged results returned by the public cache operations

use crate::error::{CacheError, Result};

/// Result of a cache read
#[derive(Debug)]
#[must_use]
pub enum Lookup<T> {
    /// Value found and decoded
    Hit(T),
    /// Nothing cached under the key (missing, expired or empty)
    Miss,
    /// The read was bypassed; the caller should behave as on a miss
    Degraded(CacheError),
}

impl<T> Lookup<T> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Collapse into an `Option`, treating every non-hit as absent
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss | Self::Degraded(_) => None,
        }
    }

    /// Why the read was bypassed, if it was
    pub fn reason(&self) -> Option<&CacheError> {
        match self {
            Self::Degraded(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Hit(value) => Lookup::Hit(f(value)),
            Self::Miss => Lookup::Miss,
            Self::Degraded(err) => Lookup::Degraded(err),
        }
    }
}

impl<T> From<Result<Option<T>>> for Lookup<T> {
    fn from(result: Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => Self::Hit(value),
            Ok(None) => Self::Miss,
            Err(err) => Self::Degraded(err),
        }
    }
}

/// Result of a cache write or maintenance operation
#[derive(Debug)]
#[must_use]
pub enum Outcome<T> {
    /// The store applied the operation
    Done(T),
    /// Nothing happened; the reason is attached
    Degraded(CacheError),
}

impl<T> Outcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Degraded(_) => None,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.done().unwrap_or(default)
    }

    pub fn reason(&self) -> Option<&CacheError> {
        match self {
            Self::Done(_) => None,
            Self::Degraded(err) => Some(err),
        }
    }
}

impl<T: Default> Outcome<T> {
    pub fn unwrap_or_default(self) -> T {
        self.done().unwrap_or_default()
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Done(value),
            Err(err) => Self::Degraded(err),
        }
    }
}
