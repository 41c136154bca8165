pub mod config;
pub mod oracle;
pub mod resolver;
pub mod session;
pub mod store;

pub use oracle::SelectorOracle;
pub use resolver::{Resolution, Resolver};
pub use session::PageSession;
pub use store::{SelectorMap, SelectorStore};
