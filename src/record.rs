use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

pub const YEAR: &str = "Year";
pub const TRIM: &str = "Trim";
pub const ENGINE: &str = "Engine";
pub const FUEL_COST: &str = "Fuel_Cost";
pub const URL: &str = "URL";
pub const MAKE: &str = "Make";
pub const MODEL: &str = "Model";

/// One stored value. Text is opaque; `Int` only appears for computed values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Text(String),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn from_value_ref(value: ValueRef<'_>) -> Cell {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Int(i),
            ValueRef::Real(f) => Cell::Text(f.to_string()),
            ValueRef::Text(t) | ValueRef::Blob(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        }
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map_or(Cell::Null, Cell::Text)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Null => f.write_str("-"),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Cell::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Cell::Int(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Cell::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// A flat row: ordered (column, value) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecRecord {
    fields: Vec<(String, Cell)>,
}

impl SpecRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.fields.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// Overwrite `column` in place, or append it if the record lacks it.
    pub fn set(&mut self, column: &str, value: Cell) {
        match self.fields.iter_mut().find(|(c, _)| c == column) {
            Some((_, v)) => *v = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn fields(&self) -> &[(String, Cell)] {
        &self.fields
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Cell::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_in_place() {
        let mut r = SpecRecord::new();
        r.set(YEAR, Cell::Text("2020".into()));
        r.set(MAKE, Cell::Null);
        r.set(YEAR, Cell::Text("2021".into()));
        assert_eq!(r.fields().iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>(), vec![YEAR, MAKE]);
        assert_eq!(r.text(YEAR), Some("2021"));
    }

    #[test]
    fn cell_json_shape() {
        let mut r = SpecRecord::new();
        r.set(FUEL_COST, Cell::Int(0));
        r.set(ENGINE, Cell::Text("Electric".into()));
        r.set("MSRP", Cell::Null);
        let json = serde_json::to_value(r.fields()).unwrap();
        assert_eq!(json, serde_json::json!([["Fuel_Cost", 0], ["Engine", "Electric"], ["MSRP", null]]));
    }
}
