pub mod config;
pub mod handles;
pub mod ids;

// Foundation crate: small, well-tested primitives only.
pub use config::*;
pub use handles::*;
pub use ids::*;
