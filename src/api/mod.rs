//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /cache/:key` - Store a value with optional expiration
//! - `GET /cache/:key` - Retrieve a value, sliding its expiry
//! - `POST /cache/:key/refresh` - Slide the expiry without reading
//! - `DELETE /cache/:key` - Delete a key
//! - `POST /cleanup` - Sweep expired entries now
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
