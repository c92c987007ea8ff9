//! The operations the HTTP layer and the admin tool build on.
//!
//! Every operation takes the store (and any other collaborators) explicitly,
//! along with the current time, and holds no state of its own.

pub mod audit;
pub mod ballot_box;
pub mod identity;
pub mod password;
pub mod session;
