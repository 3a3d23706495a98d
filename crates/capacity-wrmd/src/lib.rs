//! WRMD adapter for the capacity reconciler.
//!
//! Reads the paginated `lists` view and each patient's Initial Care exam
//! from the Wildlife Rehabilitation MD web application, and exposes them
//! through [`capacity_core::source::ExternalSource`].
//!
//! The page parsers are plain string functions and always available. The
//! signed-in HTTP session and the `capacity-sync` binary need the `http`
//! feature.

pub mod config;
pub mod html;
pub mod parse;
#[cfg(feature = "http")]
pub mod session;

pub use config::{ConfigError, SyncConfig};
pub use parse::{ListingRow, ParseError};
#[cfg(feature = "http")]
pub use session::WrmdSession;
