use std::collections::HashMap;

use sift_data::plan::{preload_statement, PRELOAD_KEY};
use sift_data::{DataError, Dialect, Entity, Preload, Record, Value};
use sqlx::AnyConnection;

use crate::exec;

/// Load every preload for `entities`: one query per relation, rows grouped
/// by foreign key and handed to `Entity::attach`. Parents without related
/// rows receive an empty list.
pub(crate) async fn load_relations<T: Entity>(
    conn: &mut AnyConnection,
    entities: &mut [T],
    preloads: &[Preload],
    locale: &str,
    dialect: Dialect,
) -> Result<(), DataError> {
    if entities.is_empty() {
        return Ok(());
    }
    for preload in preloads {
        let mut keys: Vec<Value> = Vec::new();
        for entity in entities.iter() {
            if let Some(key) = entity.key_value(&preload.local_key) {
                if !key.is_null() && !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let mut groups: HashMap<String, Vec<Record>> = HashMap::new();
        if !keys.is_empty() {
            let stmt = preload_statement(preload, keys, locale, dialect)?;
            for row in exec::fetch_rows(conn, &stmt).await? {
                let mut record = exec::decode_record(&row)?;
                let key = record.remove(PRELOAD_KEY).unwrap_or(Value::Null);
                groups.entry(key.to_text()).or_default().push(record);
            }
        }
        tracing::trace!(relation = %preload.relation, groups = groups.len(), "Preloaded relation");

        for entity in entities.iter_mut() {
            let records = entity
                .key_value(&preload.local_key)
                .and_then(|key| groups.get(&key.to_text()).cloned())
                .unwrap_or_default();
            entity.attach(&preload.relation, records)?;
        }
    }
    Ok(())
}
