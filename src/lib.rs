//! PDF Image Server
//!
//! Accepts PDF uploads over HTTP, pulls out every distinct embedded image,
//! and serves the results back by file name.

pub mod config;
pub mod error;
pub mod extractor;
pub mod pdf;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
