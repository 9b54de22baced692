//! Domain model for the BRP kennisgevingen (notification) service.
//!
//! A client application registers a *volgindicatie* (subscription) on a BSN
//! and then polls three change feeds: mutated persons, new residents, and
//! BSN renumberings. This crate holds the domain types, the BSN checksum
//! validator, the clock abstraction, and the [`store::SubscriptionStore`]
//! trait that storage backends implement.

pub mod bsn;
pub mod clock;
pub mod error;
pub mod feed;
pub mod store;
pub mod subscription;

pub use bsn::{Bsn, is_valid_bsn};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
