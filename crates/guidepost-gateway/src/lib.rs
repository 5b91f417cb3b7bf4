pub mod connection;
pub mod handshake;
pub mod lifecycle;
pub mod registry;
pub mod router;
