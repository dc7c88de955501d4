pub mod readiness;
pub mod timer;

pub use readiness::*;
pub use timer::*;
