//! Domain model: artifacts, payment vocabulary, provider requests and the
//! ports the application layer drives.

pub mod artifact;
pub mod generation;
pub mod payment;
pub mod ports;
