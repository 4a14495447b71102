pub mod libcquizy;

#[cfg(feature = "client")]
pub mod cli;
#[cfg(feature = "server")]
pub mod server;
