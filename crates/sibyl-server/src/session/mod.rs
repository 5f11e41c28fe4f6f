//! Session lifecycle: handles, the registry, and the per-session worker.

pub mod handle;
pub mod registry;
pub mod worker;

pub use handle::{SessionHandle, SubmitError};
pub use registry::{SessionEvent, SessionObserver, SessionRegistry};
