//! Request and Response models for the control server API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{ConnectivityRequest, PrefetchRequest};
pub use responses::{
    CacheSizeResponse, ClearResponse, ConnectivityResponse, DeliveryResponse, HealthResponse,
    RegistrationResponse, StatsResponse, UnregisterResponse, UpdateResponse,
};
