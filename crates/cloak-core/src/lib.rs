pub mod camera;
pub mod config;
pub mod effect;
pub mod frame;
pub mod streamer;
pub mod streaming;

pub use config::Config;
