//! Company Intelligence API Library
//!
//! Backend for the business-intelligence dashboard: starts Clay.com searches,
//! receives leads and enrichment results through Clay webhooks, keeps them in
//! file-backed stores, and serves them back to the dashboard.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `app`: Router assembly and HTTP middleware.
//! - `circuit_breaker`: Circuit breaker for outbound calls.
//! - `clay_client`: Outbound Clay.com webhook client.
//! - `config`: Configuration management.
//! - `enrichment`: Payload cleanup, field mapping and merge rules.
//! - `errors`: Error handling types.
//! - `events`: Lead events pushed to SSE subscribers.
//! - `file_lock`: Lock file guarding store files.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `openapi`: OpenAPI document.
//! - `replay_guard`: Duplicate webhook delivery detection.
//! - `storage`: JSON file stores for leads and enriched competitors.
//! - `webhook_handler`: Clay webhook handlers.
//! - `webhook_models`: Webhook payload models.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod app;
pub mod circuit_breaker;
pub mod clay_client;
pub mod config;
pub mod enrichment;
pub mod errors;
pub mod events;
pub mod file_lock;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod replay_guard;
pub mod storage;
pub mod webhook_handler;
pub mod webhook_models;
