pub mod connection;
pub mod dispatcher;
pub mod ports;

pub use dispatcher::Dispatcher;
pub use ports::{ConnectionPusher, GatewayError, Publisher};
