//! API Module
//!
//! HTTP handlers and routing for the control server.
//!
//! # Endpoints
//! - `POST|DELETE /registration` - Register or unregister the caching process
//! - `POST /update/check`, `POST /update/activate` - Version updates
//! - `DELETE /caches`, `GET /caches/size` - Namespace maintenance
//! - `GET|PUT /connectivity` - Online state
//! - `POST /prefetch`, `POST /messages` - Seeding and control messages
//! - `ANY /fetch/*path` - The interception point
//! - `GET /stats`, `GET /health` - Observability

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
