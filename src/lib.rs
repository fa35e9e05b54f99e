pub mod auth;
pub mod commands;
pub mod config;
pub mod http;
