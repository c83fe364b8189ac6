//! Core configuration management types.

mod builder;
mod handle;
mod manager;
mod scope;
mod snapshot;

pub use builder::ManagerBuilder;
pub use handle::K;
pub use manager::Manager;
pub use scope::Scope;
pub use snapshot::{Snapshot, Subset};
