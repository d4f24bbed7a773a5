//! Decide whether a pod asked for the lxcfs volumes and build the JSON
//! patch that injects them.
//!
//! This crate does no I/O: the HTTP server and the cluster registration
//! live inside of the `lxcfs-admission-webhook` crate.

pub mod admission_request;
pub mod admission_response;
pub mod admission_review;
pub mod engine;
pub mod errors;
pub mod injection_table;
pub mod mutation_policy;
pub mod patch;
pub mod scheme;

pub use engine::AdmissionDecisionEngine;
pub use injection_table::InjectionTable;
pub use mutation_policy::MutationPolicy;
pub use scheme::Scheme;
