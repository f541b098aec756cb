use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::info;

use crate::dataset::Dataset;
use crate::record::{Cell, ENGINE, MAKE, MODEL};

/// Table layout used when a run collected nothing at all.
pub const DEFAULT_COLUMNS: &[&str] = &[
    "Year", "Trim", "MSRP", "Engine", "Power", "Fuel_Cost", "Vehicle_Type", "Category",
    "Weight", "Charging_time", "Range", "Battery", "Co2_km", "URL", "Make", "Model",
];

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

/// Open an existing database for the read-only commands.
pub fn open_read_only(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open {} (has a crawl been run?)", path.display()))
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// ── Load ──

/// Drop and recreate `table` with the dataset's columns, then insert every row.
pub fn replace_table(conn: &Connection, table: &str, data: &Dataset) -> Result<usize> {
    let columns: Vec<(String, &str)> = if data.columns.is_empty() {
        DEFAULT_COLUMNS.iter().map(|c| (c.to_string(), "TEXT")).collect()
    } else {
        data.columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), data.column_type(i)))
            .collect()
    };

    let defs = columns
        .iter()
        .map(|(c, ty)| if ty.is_empty() { quote(c) } else { format!("{} {}", quote(c), ty) })
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {t}; CREATE TABLE {t} ({defs});",
        t = quote(table),
        defs = defs
    ))?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            quote(table),
            placeholders
        ))?;
        for row in &data.rows {
            count += stmt.execute(params_from_iter(row.iter()))?;
        }
    }
    tx.commit()?;
    info!("Wrote {} rows to table '{}'", count, table);
    Ok(count)
}

// ── Read ──

fn read(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Dataset> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let n = columns.len();
    let rows = stmt
        .query_map(params, |row| {
            (0..n)
                .map(|i| row.get_ref(i).map(Cell::from_value_ref))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Dataset { columns, rows })
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Rows whose Engine contains `needle`, case-insensitively.
pub fn fetch_engine_like(conn: &Connection, table: &str, needle: &str, limit: Option<usize>) -> Result<Dataset> {
    let sql = format!(
        "SELECT * FROM {} WHERE LOWER({}) LIKE ?1 ESCAPE '\\'{}",
        quote(table),
        quote(ENGINE),
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
    read(conn, &sql, rusqlite::params![pattern])
        .with_context(|| format!("Failed to query '{}' (has a crawl been run?)", table))
}

/// First rows for one make.
pub fn fetch_make(conn: &Connection, table: &str, make: &str, limit: usize) -> Result<Dataset> {
    let sql = format!(
        "SELECT * FROM {} WHERE {} = ?1 COLLATE NOCASE LIMIT {}",
        quote(table),
        quote(MAKE),
        limit
    );
    read(conn, &sql, rusqlite::params![make])
        .with_context(|| format!("Failed to query '{}' (has a crawl been run?)", table))
}

pub fn fetch_all(conn: &Connection, table: &str) -> Result<Dataset> {
    read(conn, &format!("SELECT * FROM {}", quote(table)), &[])
        .with_context(|| format!("Failed to query '{}' (has a crawl been run?)", table))
}

// ── Stats ──

pub struct Stats {
    pub rows: usize,
    pub makes: usize,
    pub models: usize,
    pub electric: usize,
}

pub fn get_stats(conn: &Connection, table: &str) -> Result<Stats> {
    let t = quote(table);
    let count = |sql: String| -> Result<usize> {
        conn.query_row(&sql, [], |r| r.get(0))
            .with_context(|| format!("Failed to query '{}' (has a crawl been run?)", table))
    };
    Ok(Stats {
        rows: count(format!("SELECT COUNT(*) FROM {}", t))?,
        makes: count(format!("SELECT COUNT(DISTINCT {}) FROM {}", quote(MAKE), t))?,
        models: count(format!(
            "SELECT COUNT(*) FROM (SELECT DISTINCT {}, {} FROM {})",
            quote(MAKE),
            quote(MODEL),
            t
        ))?,
        electric: count(format!(
            "SELECT COUNT(*) FROM {} WHERE LOWER({}) LIKE '%electric%'",
            t,
            quote(ENGINE)
        ))?,
    })
}
