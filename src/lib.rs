pub mod config;
pub mod db;
pub mod mention;
pub mod reply;
pub mod scheduler;
pub mod services;
pub mod throttle;
pub mod twitter;

#[cfg(test)]
pub(crate) mod testing;
