pub mod cookies;
pub mod session;

pub use chromiumoxide::Element;
pub use session::{SessionOptions, StealthSession};
