//! In-memory tabular datasets and the relational operations the transform
//! needs: rename, projection and inner join.

use crate::error::{EtlError, EtlResult};
use crate::value::{Key, Value};

use std::collections::HashMap;

/// Ordered rows with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Create an empty dataset with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. The row must have one cell per column.
    pub fn push(&mut self, row: Vec<Value>) -> EtlResult<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::transform(format!(
                "row has {} cells but dataset has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Builder-style [`push`](Self::push) for fixtures.
    pub fn with_row(mut self, row: Vec<Value>) -> EtlResult<Self> {
        self.push(row)?;
        Ok(self)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, if present.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Position of a column, or an error naming it.
    pub fn require(&self, column: &str) -> EtlResult<usize> {
        self.position(column)
            .ok_or_else(|| EtlError::transform(format!("missing column '{}'", column)))
    }

    /// Rename columns according to `(from, to)` pairs. Unknown names are
    /// ignored.
    pub fn rename(mut self, renames: &[(&str, &str)]) -> Self {
        for (from, to) in renames {
            if let Some(i) = self.position(from) {
                self.columns[i] = (*to).to_string();
            }
        }
        self
    }

    /// Keep only the named columns, in the given order.
    pub fn project(&self, columns: &[&str]) -> EtlResult<Self> {
        let idx = columns
            .iter()
            .map(|c| self.require(c))
            .collect::<EtlResult<Vec<_>>>()?;
        Ok(Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Inner join `self` (left) with `right` on `left_on = right_on`.
    ///
    /// Output columns are the left columns followed by the right columns.
    /// When both keys share a name the right key is dropped. Any other
    /// column present on both sides is suffixed `_x` (left) and `_y`
    /// (right). Rows are emitted in left order, each followed by its
    /// matches in right order. Null keys never match.
    pub fn inner_join(&self, right: &Dataset, left_on: &str, right_on: &str) -> EtlResult<Self> {
        let li = self.require(left_on)?;
        let ri = right.require(right_on)?;
        let shared_key = left_on == right_on;

        let right_keep: Vec<usize> = (0..right.columns.len())
            .filter(|&i| !(shared_key && i == ri))
            .collect();

        let mut columns = Vec::with_capacity(self.columns.len() + right_keep.len());
        for name in &self.columns {
            let clashes = right_keep.iter().any(|&i| &right.columns[i] == name);
            if clashes && !(shared_key && name == left_on) {
                columns.push(format!("{}_x", name));
            } else {
                columns.push(name.clone());
            }
        }
        for &i in &right_keep {
            let name = &right.columns[i];
            if self.columns.contains(name) {
                columns.push(format!("{}_y", name));
            } else {
                columns.push(name.clone());
            }
        }

        let mut index: HashMap<Key, Vec<usize>> = HashMap::new();
        for (pos, row) in right.rows.iter().enumerate() {
            if let Some(key) = row[ri].key() {
                index.entry(key).or_default().push(pos);
            }
        }

        let mut rows = Vec::new();
        for left_row in &self.rows {
            let Some(key) = left_row[li].key() else {
                continue;
            };
            let Some(matches) = index.get(&key) else {
                continue;
            };
            for &pos in matches {
                let right_row = &right.rows[pos];
                let mut row = Vec::with_capacity(columns.len());
                row.extend(left_row.iter().cloned());
                row.extend(right_keep.iter().map(|&i| right_row[i].clone()));
                rows.push(row);
            }
        }

        Ok(Self { columns, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn orders() -> Dataset {
        Dataset::new(["pedido_id", "estado"])
            .with_row(vec![1.into(), "pagado".into()])
            .unwrap()
            .with_row(vec![2.into(), "enviado".into()])
            .unwrap()
    }

    fn lines() -> Dataset {
        Dataset::new(["pedido_id", "producto_id", "estado"])
            .with_row(vec![1.into(), 10.into(), "ok".into()])
            .unwrap()
            .with_row(vec![1.into(), 11.into(), "ok".into()])
            .unwrap()
            .with_row(vec![3.into(), 10.into(), "ok".into()])
            .unwrap()
            .with_row(vec![Value::Null, 12.into(), "ok".into()])
            .unwrap()
    }

    #[test]
    fn test_push_rejects_wrong_width() {
        let mut ds = Dataset::new(["a", "b"]);
        assert!(ds.push(vec![1.into()]).is_err());
        assert!(ds.is_empty());
    }

    #[test]
    fn test_rename_and_project() {
        let ds = orders().rename(&[("estado", "estado_pedido"), ("nope", "x")]);
        assert_eq!(ds.columns(), &["pedido_id".to_string(), "estado_pedido".to_string()]);

        let projected = ds.project(&["estado_pedido"]).unwrap();
        assert_eq!(projected.rows()[1], vec![Value::from("enviado")]);
        assert!(ds.project(&["missing"]).is_err());
    }

    #[test]
    fn test_inner_join_shared_key_and_suffixes() {
        let joined = lines().inner_join(&orders(), "pedido_id", "pedido_id").unwrap();

        assert_eq!(
            joined.columns(),
            &["pedido_id", "producto_id", "estado_x", "estado_y"].map(String::from)
        );
        // Order 3 has no parent and the null key never matches.
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.rows()[1][1], Value::Int(11));
        assert_eq!(joined.rows()[1][3], Value::from("pagado"));
    }

    #[test]
    fn test_inner_join_distinct_keys_keeps_both() {
        let products = Dataset::new(["producto_id", "id_marca_producto"])
            .with_row(vec![10.into(), 5.into()])
            .unwrap();
        let brands = Dataset::new(["marca_id", "nombre_marca"])
            .with_row(vec![Value::Float(5.0), "Acme".into()])
            .unwrap();

        let joined = products.inner_join(&brands, "id_marca_producto", "marca_id").unwrap();
        assert_eq!(joined.columns().len(), 4);
        assert_eq!(joined.rows()[0][3], Value::from("Acme"));
    }

    #[test]
    fn test_inner_join_fans_out_on_duplicate_right_keys() {
        let right = Dataset::new(["k", "v"])
            .with_row(vec![1.into(), "a".into()])
            .unwrap()
            .with_row(vec![1.into(), "b".into()])
            .unwrap();
        let left = Dataset::new(["k"]).with_row(vec![1.into()]).unwrap();
        assert_eq!(left.inner_join(&right, "k", "k").unwrap().len(), 2);
    }

    #[test]
    fn test_inner_join_unknown_column() {
        assert!(orders().inner_join(&lines(), "nope", "pedido_id").is_err());
    }
}
