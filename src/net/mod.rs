pub mod channel;
pub mod packet;
pub mod protocol;
pub mod server;
pub mod session;
