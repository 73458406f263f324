pub mod common;
pub mod error;
pub mod location;
pub mod mutation;
pub mod notification;
pub mod relation;

pub use common::*;
pub use error::*;
pub use location::*;
pub use mutation::*;
pub use notification::*;
pub use relation::*;
