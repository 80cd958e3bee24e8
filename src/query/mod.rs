//! Query synthesis and the data store bridge

pub mod bridge;
pub mod builder;
pub mod catalog;
pub mod sqlite;

pub use bridge::{QueryBridge, Row, Value};
pub use builder::{is_identifier, SelectQuery};
pub use catalog::ValueCatalog;
pub use sqlite::SqliteBridge;
