pub mod backoff;
pub mod cache;
pub mod config;
pub mod controller;
pub mod source;
pub mod status;

pub use backoff::*;
pub use cache::*;
pub use config::*;
pub use controller::*;
pub use source::*;
pub use status::*;
