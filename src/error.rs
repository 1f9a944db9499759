//! Centralized error type for the fxhost umbrella crate.
//!
//! Wraps both subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] fxhost_core::Error),

    #[error("Plugin: {0}")]
    Plugin(#[from] fxhost_plugin::HostError),

    /// Realtime start failed; the master instance is kept in the error.
    #[error("Realtime: {0}")]
    Realtime(#[from] fxhost_plugin::StartError),
}

impl Error {
    /// Soft failures leave the host and its instances usable.
    pub fn is_soft(&self) -> bool {
        match self {
            Error::Plugin(e) => e.is_soft(),
            Error::Realtime(e) => e.error.is_soft(),
            Error::Core(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
