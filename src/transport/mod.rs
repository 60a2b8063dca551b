pub mod traits;
pub mod websocket;

pub use traits::{ControlChannel, ControlConnector};
pub use websocket::{WebSocketChannel, WebSocketConnector};
