pub mod albums;
pub mod discover;
pub mod matcher;
pub mod metadata;
pub mod sidecar;
