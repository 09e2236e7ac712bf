//! SQLite store: schema, catalog, raw observations and derived generations

pub mod catalog;
pub mod generations;
pub mod init;
pub mod raw;
pub mod scores;

pub use catalog::*;
pub use generations::*;
pub use init::*;
pub use raw::*;
pub use scores::*;
