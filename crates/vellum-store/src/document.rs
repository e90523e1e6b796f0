use serde::{Deserialize, Serialize};

use vellum_types::{Fields, RecordId};

/// A stored document: store-assigned identifier plus schemaless body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: RecordId,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: RecordId, fields: Fields) -> Self {
        Self { id, fields }
    }
}
