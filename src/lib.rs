//! Ingests land-border-crossing counts from the BTS Socrata service,
//! cleans known defects, filters to passenger traffic, and publishes a
//! monthly aggregate snapshot for display.

pub mod aggregate;
pub mod clean;
pub mod error;
pub mod fetch;
pub mod snapshot;
pub mod transform;
