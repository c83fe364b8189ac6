//! Change notification for configuration updates.

mod observers;

pub use observers::{EverythingObserver, KeyObserver, ObserverRegistry, Subscription};
