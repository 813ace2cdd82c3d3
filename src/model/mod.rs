//! Plain data types: resource descriptors going in, state snapshots coming out.

pub mod descriptor;
pub mod state;

pub use descriptor::*;
pub use state::*;
