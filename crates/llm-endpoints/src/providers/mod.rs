//! Concrete vendor implementations
//!
//! This module contains implementations of the [`EndpointProvider`] trait
//! for the supported vendors.
//!
//! [`EndpointProvider`]: crate::EndpointProvider

#[cfg(feature = "cohere")]
pub mod cohere;

#[cfg(feature = "cohere")]
pub use cohere::{CohereConfig, CohereProvider};
