// Batch transfer orchestration over one open connection

mod connection;
mod directory;
mod get;
pub mod health;
mod put;

pub use connection::Connection;
pub use directory::directory_segments;
pub use health::test_connection;
