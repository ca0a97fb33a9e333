pub mod api;
pub mod http;

pub use api::{CanvasApi, RemoteResponse, TransportError};
pub use http::{CanvasConfig, HttpCanvasClient};
