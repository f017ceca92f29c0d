pub mod error;
pub mod repo;
pub mod service;
pub mod validation;

#[cfg(test)]
mod service_test;
