pub mod auth;
pub mod config;
mod http_layers;
pub mod images;
mod record_routes;
pub mod server;
mod session;
pub mod state;

pub use auth::{Authenticator, SessionStore, SingleUserAuthenticator};
pub use config::ServerConfig;
pub use http_layers::*;
pub use images::ImageStore;
pub use server::{make_app, run_server};
