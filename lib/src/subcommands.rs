pub use client::*;
pub use predict::*;
pub use server::*;
pub use setup::*;

pub mod client;
pub mod predict;
pub mod server;
pub mod setup;
