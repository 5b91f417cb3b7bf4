pub mod accounts;
pub mod error;
pub mod extract;
pub mod messages;
pub mod routes;
pub mod service;
pub mod state;
