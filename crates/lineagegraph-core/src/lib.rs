pub mod config_manager;
pub mod error;
pub mod render;
pub mod types;

pub use config_manager::*;
pub use error::*;
pub use render::*;
pub use types::*;
