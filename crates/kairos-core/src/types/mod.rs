//! Core types for kairos.

mod event;
mod facts;
mod memory;
mod message;
mod patterns;
mod profile;
mod snapshot;

pub use event::*;
pub use facts::*;
pub use memory::*;
pub use message::*;
pub use patterns::*;
pub use profile::*;
pub use snapshot::*;
