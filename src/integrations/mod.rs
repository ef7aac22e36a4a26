//! External service integrations.

pub mod clay_client {
    pub use crate::clay_client::*;
}

pub mod webhook_models {
    pub use crate::webhook_models::*;
}
