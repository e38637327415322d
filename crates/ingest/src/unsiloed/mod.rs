//! Client for the Unsiloed layout-parsing API.

pub mod client;

pub use client::{JobStatus, ParseJobClient, ParseJobError, SubmittedJob};
