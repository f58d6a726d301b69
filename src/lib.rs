pub mod combat;
mod config;
pub mod entities;
mod net;
pub mod persistence;
pub mod scripting;
pub mod telemetry;
pub mod world;

pub use config::{AppConfig, Settings};
pub use net::packet::{PacketReader, PacketWriter};
pub use net::protocol::PacketType;
pub use net::server::{run_with_control, ServerControl};
pub use net::session::SessionManager;

pub fn run(args: &[String]) -> Result<(), String> {
    let config = config::AppConfig::from_args(args)?;
    net::server::run(config)
}
