pub mod entity;
pub mod game_data;
pub mod registry;
pub mod state;
