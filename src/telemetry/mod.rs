mod logging;

pub use logging::{init, log_battle, log_error, log_game, log_netload};
