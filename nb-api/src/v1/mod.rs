mod builds;
mod clusters;
mod instances;
mod operations;
mod page;

pub use builds::*;
pub use clusters::*;
pub use instances::*;
pub use operations::*;
pub use page::*;
