pub mod client;
pub mod payload;
pub mod render;
pub mod verify;
