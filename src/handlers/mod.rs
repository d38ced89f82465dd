pub mod auth_handlers;
pub mod health_handlers;
pub mod image_handlers;
pub mod media_handlers;
