pub mod asset_service;
pub mod image_repository;
pub mod object_store;
pub mod remote_store;
pub mod session_service;
