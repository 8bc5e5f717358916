use serde::{Deserialize, Serialize};

/// A single record of the collection.
///
/// The field order is the order in which books are written to the backing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub available: bool,
}
