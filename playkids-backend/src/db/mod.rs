mod sqlite;
pub mod tables;

pub use sqlite::{is_unique_violation, Database};
#[cfg(test)]
pub use sqlite::open_temp;
