//! Diesel model structs for the `states` table.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::state::StateMeta;
use crate::schema;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = schema::states)]
#[diesel(primary_key(path))]
pub struct StateObject {
    pub path: String,
    pub name: String,
    pub role: String,
    pub value_type: String,
    pub unit: Option<String>,
    pub enum_labels: Option<serde_json::Value>,
    pub writable: bool,
    pub value: Option<serde_json::Value>,
    pub ack: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata columns written by an upsert. `value` and `ack` are left alone.
#[derive(Debug, Clone, Insertable, Serialize, Deserialize)]
#[diesel(table_name = schema::states)]
pub struct NewStateObject {
    pub path: String,
    pub name: String,
    pub role: String,
    pub value_type: String,
    pub unit: Option<String>,
    pub enum_labels: Option<serde_json::Value>,
    pub writable: bool,
}

impl NewStateObject {
    pub fn new(path: String, meta: &StateMeta) -> Self {
        NewStateObject {
            path,
            name: meta.name.clone(),
            role: meta.role.clone(),
            value_type: meta.value_type.as_str().to_string(),
            unit: meta.unit.clone(),
            enum_labels: meta
                .states
                .as_ref()
                .and_then(|labels| serde_json::to_value(labels).ok()),
            writable: meta.writable,
        }
    }
}
