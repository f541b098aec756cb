use std::collections::{HashMap, HashSet};
use std::io::Write;

use anyhow::Result;
use tracing::{info, warn};

use crate::coordinator::MakeRecords;
use crate::record::{Cell, MAKE, MODEL, TRIM, YEAR};

/// A rectangular table: every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Outer union of per-make collections by column name.
///
/// Each record's Make is forced to its map key. Columns keep first-seen order;
/// a record lacking a column gets `Null` there.
pub fn assemble(by_make: MakeRecords) -> Dataset {
    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    for (make, collection) in by_make {
        for mut record in collection {
            record.set(MAKE, Cell::Text(make.clone()));
            for (column, _) in record.fields() {
                if seen.insert(column.clone()) {
                    columns.push(column.clone());
                }
            }
            records.push(record);
        }
    }

    let rows: Vec<Vec<Cell>> = records
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.get(c).cloned().unwrap_or(Cell::Null))
                .collect()
        })
        .collect();

    let dataset = Dataset { columns, rows };
    let dupes = dataset.duplicate_keys();
    if dupes > 0 {
        warn!("{} rows repeat an earlier (Make, Model, Year, Trim)", dupes);
    }
    info!("Assembled {} rows x {} columns", dataset.rows.len(), dataset.columns.len());
    dataset
}

impl Dataset {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Storage class for a column: TEXT or INTEGER when uniform, untyped when
    /// text and integers share it.
    pub fn column_type(&self, idx: usize) -> &'static str {
        let mut text = false;
        let mut int = false;
        for row in &self.rows {
            match row[idx] {
                Cell::Text(_) => text = true,
                Cell::Int(_) => int = true,
                Cell::Null => {}
            }
        }
        match (text, int) {
            (true, true) => "",
            (false, true) => "INTEGER",
            _ => "TEXT",
        }
    }

    /// Rows whose (Make, Model, Year, Trim) already appeared higher up.
    pub fn duplicate_keys(&self) -> usize {
        let idx: Vec<Option<usize>> = [MAKE, MODEL, YEAR, TRIM]
            .iter()
            .map(|c| self.column_index(c))
            .collect();
        let mut counts: HashMap<Vec<Option<&Cell>>, usize> = HashMap::new();
        for row in &self.rows {
            let key: Vec<Option<&Cell>> = idx.iter().map(|i| i.map(|i| &row[i])).collect();
            *counts.entry(key).or_default() += 1;
        }
        counts.values().map(|n| n - 1).sum()
    }

    /// One JSON object per row, columns as keys.
    pub fn write_json_lines<W: Write>(&self, mut out: W) -> Result<usize> {
        for row in &self.rows {
            let obj: serde_json::Map<String, serde_json::Value> = self
                .columns
                .iter()
                .zip(row)
                .map(|(c, v)| -> Result<(String, serde_json::Value)> {
                    Ok((c.clone(), serde_json::to_value(v)?))
                })
                .collect::<Result<_>>()?;
            serde_json::to_writer(&mut out, &obj)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(self.rows.len())
    }
}
