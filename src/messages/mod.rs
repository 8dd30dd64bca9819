//! General data structures shared between the broker client and the consume loop.

mod error_code;
mod fetch_batch;
mod offset_selection;
mod partition_ref;
mod record;

pub use error_code::*;
pub use fetch_batch::*;
pub use offset_selection::*;
pub use partition_ref::*;
pub use record::*;
