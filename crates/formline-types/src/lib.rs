//! Shared domain types for Formline.
//!
//! This crate holds the data model used across the workspace: support forms
//! and their enums, users and roles, and chat messages. It deliberately has
//! no I/O so every other crate can depend on it.

mod chat;
mod error;
mod form;
mod user;

pub use chat::{ChatMessage, ChatRole};
pub use error::ValidationError;
pub use form::{Form, FormCategory, FormState, FormUrgency, FormView};
pub use user::{Role, User};
