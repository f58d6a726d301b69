pub mod battle;
pub mod rng;
