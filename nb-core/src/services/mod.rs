//! Typed wrappers around each service's REST surface.  Every trait is implemented by
//! [`RestClient`](crate::client::RestClient); the traits exist so the waiter and the build
//! machinery can be driven by mocks in tests.
mod builds;
mod clusters;
mod instances;
mod operations;
mod storage;

pub use builds::*;
pub use clusters::*;
pub use instances::*;
pub use operations::*;
pub use storage::*;
