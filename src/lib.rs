pub mod binance;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod indicator;
pub mod model;
pub mod server;
pub mod session;
