// Common library: batch file transfer over SFTP and FTP

pub mod circuit_breaker;
pub mod classify;
pub mod config;
pub mod errors;
pub mod models;
pub mod path_mirror;
pub mod retry;
pub mod telemetry;
pub mod transfer;
pub mod transport;
