//! Request handlers.

pub mod analysis;
pub mod analyze;
pub mod fallback;
pub mod health;

pub use analysis::*;
pub use analyze::*;
pub use fallback::*;
pub use health::*;
