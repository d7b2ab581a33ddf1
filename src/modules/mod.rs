pub mod allocator;
pub mod config;
pub mod error;
pub mod grid;
pub mod inventory;
pub mod planner;
pub mod robot;
pub mod sim;
pub mod stats;
pub mod view;
pub mod world;
