pub mod clob;
pub mod config;
pub mod health;
pub mod signing;
pub mod webhook;
pub mod ws;
