//! The hierarchical state store this service publishes into.

use crate::db::models::{NewStateObject, StateObject};
use crate::models::state::{StateMeta, StatePath, WriteEvent};
use crate::schema;
use chrono::Utc;
use diesel::PgConnection;
use diesel::prelude::*;
use log::{debug, warn};
use serde_json::Value;

pub trait StateStore {
    /// Create the object for `path` or refresh its value-affecting metadata.
    /// An existing object keeps its name and role.
    fn upsert(&mut self, path: &StatePath, meta: &StateMeta) -> Result<(), String>;

    /// Store `value` as acknowledged. A pending user write on the same path
    /// is left in place so it still reaches the translator.
    fn publish(&mut self, path: &StatePath, value: &Value) -> Result<(), String>;

    /// Unacknowledged writes made since the last call. Each write is returned once.
    fn pending_writes(&mut self) -> Result<Vec<WriteEvent>, String>;
}

/// PostgreSQL-backed store; every path is prefixed with `namespace`.
pub struct PgStateStore {
    conn: PgConnection,
    namespace: String,
}

impl PgStateStore {
    pub fn new(conn: PgConnection, namespace: &str) -> Self {
        PgStateStore {
            conn,
            namespace: namespace.trim_end_matches('.').to_string(),
        }
    }

    fn full_path(&self, path: &StatePath) -> String {
        format!("{}.{}", self.namespace, path.join())
    }
}

/// `zont.0.T102_1.guard` -> `T102_1.guard` for namespace `zont.0`.
fn strip_namespace(namespace: &str, full: &str) -> Option<StatePath> {
    full.strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(StatePath::parse)
}

impl StateStore for PgStateStore {
    fn upsert(&mut self, path: &StatePath, meta: &StateMeta) -> Result<(), String> {
        use schema::states::dsl as S;

        let row = NewStateObject::new(self.full_path(path), meta);
        diesel::insert_into(S::states)
            .values(&row)
            .on_conflict(S::path)
            .do_update()
            .set((
                S::value_type.eq(row.value_type.clone()),
                S::unit.eq(row.unit.clone()),
                S::enum_labels.eq(row.enum_labels.clone()),
                S::writable.eq(row.writable),
                S::updated_at.eq(Utc::now()),
            ))
            .execute(&mut self.conn)
            .map(|_| ())
            .map_err(|e| format!("upsert state {} failed: {}", row.path, e))
    }

    fn publish(&mut self, path: &StatePath, value: &Value) -> Result<(), String> {
        use schema::states::dsl as S;

        let full = self.full_path(path);
        let updated = diesel::update(S::states.filter(S::path.eq(&full)).filter(S::ack.eq(true)))
            .set((S::value.eq(Some(value.clone())), S::updated_at.eq(Utc::now())))
            .execute(&mut self.conn)
            .map_err(|e| format!("publish state {} failed: {}", full, e))?;
        if updated > 0 {
            return Ok(());
        }

        let ack = S::states
            .filter(S::path.eq(&full))
            .select(S::ack)
            .first::<bool>(&mut self.conn)
            .optional()
            .map_err(|e| format!("publish state {} failed: {}", full, e))?;
        match ack {
            Some(_) => {
                debug!("Store: {} has a pending write, not overwriting", full);
                Ok(())
            }
            None => Err(format!("publish state {} failed: no such object", full)),
        }
    }

    fn pending_writes(&mut self) -> Result<Vec<WriteEvent>, String> {
        use schema::states::dsl as S;

        let rows: Vec<StateObject> = diesel::update(S::states.filter(S::ack.eq(false)))
            .set(S::ack.eq(true))
            .returning(StateObject::as_returning())
            .get_results(&mut self.conn)
            .map_err(|e| format!("fetch pending writes failed: {}", e))?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(path) = strip_namespace(&self.namespace, &row.path) else {
                warn!("Store: ignoring write outside namespace {}: {}", self.namespace, row.path);
                continue;
            };
            events.push(WriteEvent {
                path,
                value: row.value.unwrap_or(Value::Null),
                ack: false,
            });
        }
        Ok(events)
    }
}

/// In-memory store used by tests.
#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Default)]
    pub struct MemoryStore {
        pub objects: BTreeMap<String, StateMeta>,
        pub values: BTreeMap<String, Value>,
        pending: Vec<WriteEvent>,
        pub publish_count: usize,
    }

    impl MemoryStore {
        /// Simulate a write coming from outside. Unacknowledged writes also
        /// replace the stored value, as they do in the database.
        pub fn write(&mut self, path: &str, value: Value, ack: bool) {
            let path = StatePath::parse(path).expect("valid path");
            if !ack {
                self.values.insert(path.join(), value.clone());
            }
            self.pending.push(WriteEvent { path, value, ack });
        }

        fn is_pending(&self, key: &str) -> bool {
            self.pending.iter().any(|e| !e.ack && e.path.join() == key)
        }

        pub fn value(&self, path: &str) -> Option<&Value> {
            self.values.get(path)
        }

        pub fn device_paths(&self) -> usize {
            self.values.keys().filter(|p| !p.starts_with("info.")).count()
        }
    }

    impl StateStore for MemoryStore {
        fn upsert(&mut self, path: &StatePath, meta: &StateMeta) -> Result<(), String> {
            let entry = self.objects.entry(path.join()).or_insert_with(|| meta.clone());
            entry.value_type = meta.value_type;
            entry.unit = meta.unit.clone();
            entry.states = meta.states.clone();
            entry.writable = meta.writable;
            Ok(())
        }

        fn publish(&mut self, path: &StatePath, value: &Value) -> Result<(), String> {
            let key = path.join();
            if !self.objects.contains_key(&key) {
                return Err(format!("publish state {} failed: no such object", key));
            }
            if self.is_pending(&key) {
                return Ok(());
            }
            self.values.insert(key, value.clone());
            self.publish_count += 1;
            Ok(())
        }

        fn pending_writes(&mut self) -> Result<Vec<WriteEvent>, String> {
            Ok(std::mem::take(&mut self.pending))
        }
    }

    #[test]
    fn upsert_keeps_name_and_role() {
        use crate::models::state::ValueType;

        let mut store = MemoryStore::default();
        let path = StatePath::new(["T102_1", "target_temp"]);
        store
            .upsert(&path, &StateMeta::temperature("Target temperature"))
            .expect("upsert");
        let renamed = StateMeta::new("Renamed", "switch", ValueType::Boolean).writable();
        store.upsert(&path, &renamed).expect("upsert");

        let meta = &store.objects["T102_1.target_temp"];
        assert_eq!(meta.name, "Target temperature");
        assert_eq!(meta.role, "value.temperature");
        assert_eq!(meta.value_type, ValueType::Boolean);
        assert!(meta.writable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn metadata_row_carries_labels() {
        let labels = BTreeMap::from([("1".to_string(), "Comfort".to_string())]);
        let meta = StateMeta::string("Thermostat mode", "level.mode").labels(labels).writable();
        let row = NewStateObject::new("zont.0.T102_1.thermostat_mode".into(), &meta);
        assert_eq!(row.value_type, "string");
        assert_eq!(row.enum_labels, Some(serde_json::json!({"1": "Comfort"})));
        assert!(row.writable);
        assert_eq!(row.unit, None);
    }

    #[test]
    fn namespace_is_stripped_from_written_paths() {
        let path = strip_namespace("zont.0", "zont.0.T102_1.guard").expect("inside namespace");
        assert_eq!(path.join(), "T102_1.guard");
        assert!(strip_namespace("zont.0", "zont.1.T102_1.guard").is_none());
        assert!(strip_namespace("zont.0", "zont.0").is_none());
        assert!(strip_namespace("zont.0", "zont.00.x").is_none());
    }
}
