pub mod action;
pub mod attributes;
pub mod inventory;
pub mod item;
pub mod statchange;
pub mod usable;
