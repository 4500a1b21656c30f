//! dog-axum: Axum adapter for DogRS content properties.
//!
//! Mounts `/{collection}/{id}/{property}` over a [`dog_content::ContentBinder`]:
//! GET streams the payload (with range and conditional support), PUT and POST
//! upload it, DELETE removes it. Binder errors become Feathers-style JSON
//! bodies with the matching status code.

pub mod app;
pub mod params;
pub mod rest;
pub mod serve;
pub mod state;
mod error;
pub use error::DogAxumError;
pub use state::ContentState;

pub use app::{axum, ContentApp};
