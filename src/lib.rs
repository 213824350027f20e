//! Grid Brawl - two-player grid fighting game core

pub mod config;
pub mod game;
pub mod input;
pub mod render;
pub mod session;
pub mod util;
