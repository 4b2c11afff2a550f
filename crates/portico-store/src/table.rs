//! Per-table storage: an ordered map from primary key to item, plus the
//! query paths over the table's own key schema and its secondary indexes.

use std::collections::BTreeMap;

use portico_core::{Item, KeySchema, KeyValue, PrimaryKey, TableSpec};

use crate::error::StorageError;
use crate::store::{KeyRange, WriteCondition};

/// The rows and spec of one table.
#[derive(Debug, Clone)]
pub(crate) struct TableData {
    pub(crate) spec: TableSpec,
    rows: BTreeMap<PrimaryKey, Item>,
}

impl TableData {
    pub(crate) fn new(spec: TableSpec) -> Self {
        Self {
            spec,
            rows: BTreeMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn get(&self, key: &PrimaryKey) -> Option<Item> {
        self.rows.get(key).cloned()
    }

    /// Insert or overwrite an item, deriving its key from its own fields.
    pub(crate) fn put(
        &mut self,
        item: Item,
        condition: Option<WriteCondition>,
    ) -> Result<(), StorageError> {
        let key = item
            .primary_key(&self.spec.key_schema)
            .map_err(|source| StorageError::MalformedItem {
                table: self.spec.name.clone(),
                source,
            })?;

        let exists = self.rows.contains_key(&key);
        match condition {
            Some(WriteCondition::KeyMustExist) if !exists => {
                return Err(StorageError::ConditionFailed {
                    table: self.spec.name.clone(),
                    key: key.to_string(),
                });
            }
            Some(WriteCondition::KeyMustNotExist) if exists => {
                return Err(StorageError::ConditionFailed {
                    table: self.spec.name.clone(),
                    key: key.to_string(),
                });
            }
            _ => {}
        }

        self.rows.insert(key, item);
        Ok(())
    }

    pub(crate) fn delete(&mut self, key: &PrimaryKey) -> bool {
        self.rows.remove(key).is_some()
    }

    /// Query by partition value with an optional sort-key range, either on
    /// the table's own key schema or on a named secondary index.
    pub(crate) fn query(
        &self,
        partition: &KeyValue,
        range: &KeyRange,
        index: Option<&str>,
    ) -> Result<Vec<Item>, StorageError> {
        match index {
            None => self.query_primary(partition, range),
            Some(name) => {
                let index_spec =
                    self.spec
                        .index(name)
                        .ok_or_else(|| StorageError::UnknownIndex {
                            table: self.spec.name.clone(),
                            index: name.to_string(),
                        })?;
                self.query_schema(&index_spec.key_schema, name, partition, range)
            }
        }
    }

    fn query_primary(
        &self,
        partition: &KeyValue,
        range: &KeyRange,
    ) -> Result<Vec<Item>, StorageError> {
        if !self.spec.key_schema.has_sort_key() && !matches!(range, KeyRange::All) {
            return Err(StorageError::NoSortKey(self.spec.name.clone()));
        }
        // Rows are ordered by (partition, sort); the filtered walk preserves
        // sort-key order within the partition.
        let items = self
            .rows
            .iter()
            .filter(|(key, _)| &key.partition == partition)
            .filter(|(key, _)| range.contains(key.sort.as_ref()))
            .map(|(_, item)| item.clone())
            .collect();
        Ok(items)
    }

    /// Scan-based query over an alternate key schema. Items missing the
    /// index's key attributes are invisible to the index (sparse semantics).
    fn query_schema(
        &self,
        schema: &KeySchema,
        index_name: &str,
        partition: &KeyValue,
        range: &KeyRange,
    ) -> Result<Vec<Item>, StorageError> {
        if schema.sort.is_none() && !matches!(range, KeyRange::All) {
            return Err(StorageError::NoSortKey(index_name.to_string()));
        }

        let mut matches: Vec<(Option<KeyValue>, PrimaryKey, Item)> = Vec::new();
        for (primary, item) in &self.rows {
            let Ok(index_partition) = item.key_value(&schema.partition) else {
                continue;
            };
            if &index_partition != partition {
                continue;
            }
            let index_sort = match &schema.sort {
                Some(attr) => match item.key_value(attr) {
                    Ok(v) => Some(v),
                    Err(_) => continue,
                },
                None => None,
            };
            if !range.contains(index_sort.as_ref()) {
                continue;
            }
            matches.push((index_sort, primary.clone(), item.clone()));
        }

        matches.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(matches.into_iter().map(|(_, _, item)| item).collect())
    }
}
