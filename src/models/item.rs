//! The item resource.

use crate::error::{DbError, DbResult};
use crate::models::Row;
use serde::{Deserialize, Serialize};

/// A persisted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub price: f64,
}

/// Item fields supplied on create and update; the id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub price: f64,
}

impl NewItem {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }
}

impl TryFrom<&Row> for Item {
    type Error = DbError;

    fn try_from(row: &Row) -> DbResult<Self> {
        let id = row
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| DbError::decode("item row has no integer 'id' column"))?;
        let name = row
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DbError::decode(format!("item {} has no text 'name' column", id)))?
            .to_string();
        let price = row
            .get("price")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| DbError::decode(format!("item {} has no numeric 'price' column", id)))?;
        Ok(Self { id, name, price })
    }
}
