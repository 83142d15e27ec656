pub mod config;
pub mod deployment;
pub mod error;
pub mod forms;
pub mod http;
pub mod middleware;
pub mod password;
pub mod response;
pub mod routes;

#[cfg(test)]
pub mod test_support;

pub use deployment::Deployment;
