pub mod api_doc;
pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod models;
pub mod navigation;
pub mod player;
pub mod recorder;
pub mod routes;
pub mod server;
pub mod shell;
pub mod state;
pub mod store;
