//! Parameter and command descriptors
//!
//! Everything here is built once, before parsing starts, and is immutable
//! afterwards.

pub mod command;
pub mod parameter;
pub mod source;
pub mod types;
pub mod value;

pub use command::*;
pub use parameter::*;
pub use source::*;
pub use types::*;
pub use value::*;
