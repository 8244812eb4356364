//! Infrastructure layer - Storage, hashing and logging implementations

pub mod logging;
pub mod user;
