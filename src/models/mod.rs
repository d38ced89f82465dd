//! Core data models for the clinic gallery.
//!
//! `ImageAsset` maps to the `images` table via `sqlx::FromRow` and
//! serializes as camelCase JSON for the admin UI and the public gallery.

pub mod image;
