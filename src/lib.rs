// Library exports for integration tests and external use

pub mod config;
pub mod errors;
pub mod mail;
pub mod services;
pub mod stores;
pub mod types;

#[cfg(test)]
pub mod test_support;
