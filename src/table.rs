//! A small named-column table for query results and join-style assembly.
//!
//! Every wrapper in this crate reshapes a platform response into rows under
//! named columns — BI query results, CRM query records, spreadsheet ranges,
//! catalog listings. `Table` is that one shared shape: column names plus
//! rows of JSON values, with the handful of operations the assembly code
//! needs (rename, concat, key-join, keep-last dedup). It is a value type,
//! not a query engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ClientError;

/// Rows of JSON values under named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, checking that every row matches the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, ClientError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(ClientError::Internal(format!(
                "row width {} does not match {} columns",
                bad.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// An empty table with the given columns.
    pub fn with_columns<S: Into<String>>(columns: Vec<S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The value at (`row`, `column`), if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)
    }

    /// Append a row, checking its width.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), ClientError> {
        if row.len() != self.columns.len() {
            return Err(ClientError::Internal(format!(
                "row width {} does not match {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Rename columns in place; names absent from the mapping are untouched.
    pub fn rename_columns(&mut self, mapping: &HashMap<String, String>) {
        for col in &mut self.columns {
            if let Some(new) = mapping.get(col) {
                *col = new.clone();
            }
        }
    }

    /// Append all rows of `other`; the column sets must match exactly.
    pub fn concat(&mut self, other: Table) -> Result<(), ClientError> {
        if self.columns != other.columns {
            return Err(ClientError::Internal(format!(
                "cannot concat: columns {:?} vs {:?}",
                self.columns, other.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Left-join `other` onto this table on `self_key` == `other_key`.
    ///
    /// Result columns are this table's columns followed by `other`'s minus
    /// its key column. Unmatched left rows are padded with nulls; when a key
    /// matches several right rows, one output row is produced per match.
    pub fn left_join(
        &self,
        other: &Table,
        self_key: &str,
        other_key: &str,
    ) -> Result<Table, ClientError> {
        self.join_impl(other, self_key, other_key, true)
    }

    /// Inner join: like [`Table::left_join`] but unmatched left rows are dropped.
    pub fn inner_join(
        &self,
        other: &Table,
        self_key: &str,
        other_key: &str,
    ) -> Result<Table, ClientError> {
        self.join_impl(other, self_key, other_key, false)
    }

    fn join_impl(
        &self,
        other: &Table,
        self_key: &str,
        other_key: &str,
        keep_unmatched: bool,
    ) -> Result<Table, ClientError> {
        let left_idx = self.column_index(self_key).ok_or_else(|| {
            ClientError::Internal(format!("join key '{self_key}' not in left table"))
        })?;
        let right_idx = other.column_index(other_key).ok_or_else(|| {
            ClientError::Internal(format!("join key '{other_key}' not in right table"))
        })?;

        let mut by_key: HashMap<String, Vec<&Vec<Value>>> = HashMap::new();
        for row in &other.rows {
            by_key
                .entry(key_of(&row[right_idx]))
                .or_default()
                .push(row);
        }

        let mut columns = self.columns.clone();
        for (i, col) in other.columns.iter().enumerate() {
            if i != right_idx {
                columns.push(col.clone());
            }
        }

        let right_width = other.columns.len() - 1;
        let mut rows = Vec::new();
        for left_row in &self.rows {
            match by_key.get(&key_of(&left_row[left_idx])) {
                Some(matches) => {
                    for right_row in matches {
                        let mut combined = left_row.clone();
                        for (i, v) in right_row.iter().enumerate() {
                            if i != right_idx {
                                combined.push(v.clone());
                            }
                        }
                        rows.push(combined);
                    }
                }
                None if keep_unmatched => {
                    let mut combined = left_row.clone();
                    combined.extend(std::iter::repeat(Value::Null).take(right_width));
                    rows.push(combined);
                }
                None => {}
            }
        }

        Ok(Table { columns, rows })
    }

    /// Drop duplicate rows over the given key columns, keeping the last
    /// occurrence of each key (matching spreadsheet append semantics).
    pub fn dedup_keep_last(&mut self, key_columns: &[&str]) -> Result<(), ClientError> {
        let indices: Vec<usize> = key_columns
            .iter()
            .map(|c| {
                self.column_index(c)
                    .ok_or_else(|| ClientError::Internal(format!("dedup key '{c}' not found")))
            })
            .collect::<Result<_, _>>()?;

        let mut last_for_key: HashMap<String, usize> = HashMap::new();
        for (i, row) in self.rows.iter().enumerate() {
            let key = indices
                .iter()
                .map(|&idx| key_of(&row[idx]))
                .collect::<Vec<_>>()
                .join("\u{1f}");
            last_for_key.insert(key, i);
        }

        let keep: Vec<usize> = {
            let mut v: Vec<usize> = last_for_key.into_values().collect();
            v.sort_unstable();
            v
        };
        self.rows = keep.into_iter().map(|i| self.rows[i].clone()).collect();
        Ok(())
    }
}

/// A stable string key for a JSON value (numbers and strings compare by
/// their canonical text form).
fn key_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(cols: &[&str], rows: Vec<Vec<Value>>) -> Table {
        Table::new(cols.iter().map(|s| s.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![json!(1)]],
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::Internal(_)));
    }

    #[test]
    fn rename_leaves_unmapped_columns() {
        let mut t = table(&["Id", "Name"], vec![]);
        let mut mapping = HashMap::new();
        mapping.insert("Id".to_string(), "product_id".to_string());
        t.rename_columns(&mapping);
        assert_eq!(t.columns(), &["product_id".to_string(), "Name".to_string()]);
    }

    #[test]
    fn concat_requires_matching_columns() {
        let mut a = table(&["x"], vec![vec![json!(1)]]);
        let b = table(&["y"], vec![vec![json!(2)]]);
        assert!(a.concat(b).is_err());

        let c = table(&["x"], vec![vec![json!(2)]]);
        a.concat(c).unwrap();
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn left_join_pads_unmatched_with_null() {
        let left = table(
            &["id", "name"],
            vec![
                vec![json!("a"), json!("uno")],
                vec![json!("b"), json!("dos")],
            ],
        );
        let right = table(&["key", "region"], vec![vec![json!("a"), json!("norte")]]);
        let joined = left.left_join(&right, "id", "key").unwrap();
        assert_eq!(joined.columns(), &["id", "name", "region"]);
        assert_eq!(joined.get(0, "region"), Some(&json!("norte")));
        assert_eq!(joined.get(1, "region"), Some(&Value::Null));
    }

    #[test]
    fn inner_join_drops_unmatched() {
        let left = table(
            &["id"],
            vec![vec![json!("a")], vec![json!("b")]],
        );
        let right = table(&["id", "v"], vec![vec![json!("b"), json!(9)]]);
        let joined = left.inner_join(&right, "id", "id").unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined.get(0, "v"), Some(&json!(9)));
    }

    #[test]
    fn join_duplicates_left_row_per_match() {
        let left = table(&["id"], vec![vec![json!("a")]]);
        let right = table(
            &["id", "v"],
            vec![vec![json!("a"), json!(1)], vec![json!("a"), json!(2)]],
        );
        let joined = left.inner_join(&right, "id", "id").unwrap();
        assert_eq!(joined.len(), 2);
    }

    #[test]
    fn dedup_keeps_last_occurrence() {
        let mut t = table(
            &["k", "v"],
            vec![
                vec![json!("a"), json!(1)],
                vec![json!("b"), json!(2)],
                vec![json!("a"), json!(3)],
            ],
        );
        t.dedup_keep_last(&["k"]).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(1, "v"), Some(&json!(3)));
    }

    #[test]
    fn numeric_and_string_keys_do_not_collide() {
        assert_ne!(key_of(&json!(1)), key_of(&json!("1.0")));
        assert_eq!(key_of(&json!("x")), "x");
    }
}
