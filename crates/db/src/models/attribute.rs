use sqlx::FromRow;
use warden_core::backend::Attribute;

/// A row from the `attributes` table.
#[derive(Debug, Clone, FromRow)]
pub struct AttributeRow {
    pub id: i64,
    pub event_id: String,
    pub value: String,
}

impl From<AttributeRow> for Attribute {
    fn from(row: AttributeRow) -> Self {
        Attribute {
            id: row.id.to_string(),
            event_id: row.event_id,
            value: row.value,
        }
    }
}
