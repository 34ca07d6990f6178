pub mod analysis;
pub mod events;
pub mod jobs;
pub mod validation;
pub mod video;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
