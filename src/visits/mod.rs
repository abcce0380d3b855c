//! Visit counting logic.

mod counter;
mod identifier;
mod locks;

pub use counter::{VisitCounter, WINDOW};
pub use identifier::ClientIdentifier;
pub use locks::KeyLocks;
