pub mod directory;
pub mod events;
pub mod fanout;
pub mod hub;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod transport;
