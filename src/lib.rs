pub mod client;
pub mod config;
pub mod http;
pub mod humanize;
pub mod json;
pub mod models;
pub mod observability;
pub mod outcome;
pub mod parsers;
pub mod session;
pub mod version;
pub mod worker;
