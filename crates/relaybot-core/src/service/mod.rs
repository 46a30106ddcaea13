pub mod bot;
pub mod commands;
pub mod gateway;
pub mod http;
