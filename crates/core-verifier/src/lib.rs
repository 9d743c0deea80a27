pub mod catalog;
pub mod comparator;
pub mod entities;
pub mod errors;
pub mod scoring;
pub mod service;

pub use catalog::{Challenge, ChallengeCatalog};
pub use entities::*;
pub use service::{CoreVerificationService, VerificationService};

#[cfg(test)]
pub mod tests;
