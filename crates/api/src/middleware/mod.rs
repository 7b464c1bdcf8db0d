//! Request middleware

pub mod rate_limit;

pub use rate_limit::rate_limit_middleware;
