use crate::time_series::{Sample, SeriesSource, SourceError};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Table and column names are interpolated into SQL, so only plain
/// identifiers are accepted.
fn validate_identifier(name: &str) -> Result<&str, SourceError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(SourceError::InvalidIdentifier(name.to_string()))
    }
}

/// SQLite database holding input series and weighted window results.
///
/// Rows are read in `rowid` order; a NULL cell is a missing sample.
#[derive(Debug)]
pub struct SqliteSeriesStore {
    conn: Connection,
}

impl SqliteSeriesStore {
    /// Opens (or creates) a file-based database.
    ///
    /// # Errors
    /// Returns `SourceError::Sqlite` if the database cannot be opened.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, SourceError> {
        let conn = Connection::open(db_path)?;
        Ok(SqliteSeriesStore { conn })
    }

    /// Opens an existing database for reading. The file is never created.
    ///
    /// # Errors
    /// Returns `SourceError::InputNotFound` if `db_path` does not exist.
    pub fn open_read_only<P: AsRef<Path>>(db_path: P) -> Result<Self, SourceError> {
        Self::open_existing_with(db_path.as_ref(), OpenFlags::SQLITE_OPEN_READ_ONLY)
    }

    /// Opens an existing database for reading and writing. The file is never
    /// created.
    ///
    /// # Errors
    /// Returns `SourceError::InputNotFound` if `db_path` does not exist.
    pub fn open_existing<P: AsRef<Path>>(db_path: P) -> Result<Self, SourceError> {
        Self::open_existing_with(db_path.as_ref(), OpenFlags::SQLITE_OPEN_READ_WRITE)
    }

    fn open_existing_with(db_path: &Path, flags: OpenFlags) -> Result<Self, SourceError> {
        if !db_path.is_file() {
            return Err(SourceError::InputNotFound(db_path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(db_path, flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)?;
        Ok(SqliteSeriesStore { conn })
    }

    /// Creates an in-memory database. Useful for testing.
    pub fn new_in_memory() -> Result<Self, SourceError> {
        let conn = Connection::open_in_memory()?;
        Ok(SqliteSeriesStore { conn })
    }

    /// Returns a reference to the underlying SQLite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checks if a table exists in the database.
    pub fn table_exists(&self, table_name: &str) -> Result<bool, SourceError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
        let exists = stmt.exists([table_name])?;
        Ok(exists)
    }

    /// Reads one column of a table in insertion order.
    ///
    /// # Errors
    /// Returns `SourceError::InvalidIdentifier` for names that are not plain
    /// identifiers, `SourceError::TableNotFound` when the table does not
    /// exist, and `SourceError::Sqlite` if the column is missing or holds
    /// non-numeric values.
    pub fn read_column(&self, table: &str, column: &str) -> Result<Vec<Sample>, SourceError> {
        let table = validate_identifier(table)?;
        let column = validate_identifier(column)?;

        if !self.table_exists(table)? {
            return Err(SourceError::TableNotFound(table.to_string()));
        }

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT \"{}\" FROM \"{}\" ORDER BY rowid", column, table))?;
        let rows = stmt.query_map([], |row| row.get::<_, Option<f64>>(0))?;

        let mut samples = Vec::new();
        for row in rows {
            samples.push(row?.filter(|value| !value.is_nan()));
        }
        Ok(samples)
    }

    /// Writes a series into `table` as `(position, <column>)` rows, replacing
    /// any rows already stored there.
    pub fn store_series(
        &mut self,
        table: &str,
        column: &str,
        values: &[Sample],
    ) -> Result<(), SourceError> {
        let table = validate_identifier(table)?;
        let column = validate_identifier(column)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (position INTEGER PRIMARY KEY, \"{}\" REAL)",
                table, column
            ),
            [],
        )?;
        tx.execute(&format!("DELETE FROM \"{}\"", table), [])?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO \"{}\" (position, \"{}\") VALUES (?1, ?2)",
                table, column
            ))?;
            for (position, value) in values.iter().enumerate() {
                stmt.execute(rusqlite::params![position as i64, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// One column of one SQLite table, read as a series.
#[derive(Debug)]
pub struct SqliteSeriesSource {
    store: SqliteSeriesStore,
    table: String,
    column: String,
}

impl SqliteSeriesSource {
    /// Opens the existing database at `db_path` read-only and selects
    /// `table.column`.
    pub fn open<P: AsRef<Path>>(
        db_path: P,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Result<Self, SourceError> {
        Self::from_store(SqliteSeriesStore::open_read_only(db_path)?, table, column)
    }

    pub fn from_store(
        store: SqliteSeriesStore,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let table = table.into();
        let column = column.into();
        validate_identifier(&table)?;
        validate_identifier(&column)?;
        Ok(SqliteSeriesSource {
            store,
            table,
            column,
        })
    }

    pub fn store(&self) -> &SqliteSeriesStore {
        &self.store
    }
}

impl SeriesSource for SqliteSeriesSource {
    fn read_series(&self) -> Result<Vec<Sample>, SourceError> {
        self.store.read_column(&self.table, &self.column)
    }

    fn describe(&self) -> String {
        format!("sqlite table {} (column {})", self.table, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_readings() -> SqliteSeriesStore {
        let store = SqliteSeriesStore::new_in_memory().unwrap();
        store
            .connection()
            .execute("CREATE TABLE readings (label TEXT, value REAL)", [])
            .unwrap();
        for (label, value) in [("a", Some(1.0)), ("b", None), ("c", Some(3.5))] {
            store
                .connection()
                .execute(
                    "INSERT INTO readings (label, value) VALUES (?1, ?2)",
                    rusqlite::params![label, value],
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn test_reads_column_in_rowid_order() {
        let store = store_with_readings();
        let series = store.read_column("readings", "value").unwrap();
        assert_eq!(series, vec![Some(1.0), None, Some(3.5)]);
    }

    #[test]
    fn test_source_wraps_store() {
        let source = SqliteSeriesSource::from_store(store_with_readings(), "readings", "value").unwrap();
        assert_eq!(source.read_series().unwrap().len(), 3);
        assert!(source.describe().contains("readings"));
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        let store = store_with_readings();
        assert!(matches!(
            store.read_column("readings; DROP TABLE readings", "value"),
            Err(SourceError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            store.read_column("readings", "1value"),
            Err(SourceError::InvalidIdentifier(_))
        ));
        assert!(store.table_exists("readings").unwrap());
    }

    #[test]
    fn test_missing_table_is_reported() {
        let store = SqliteSeriesStore::new_in_memory().unwrap();
        let err = store.read_column("absent", "value").unwrap_err();
        assert_eq!(err, SourceError::TableNotFound("absent".to_string()));
        assert_eq!(err.to_string(), "Table not found: absent");
    }

    #[test]
    fn test_open_never_creates_missing_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("typo.db");

        assert_eq!(
            SqliteSeriesSource::open(&db_path, "readings", "level").unwrap_err(),
            SourceError::InputNotFound(db_path.clone())
        );
        assert!(matches!(
            SqliteSeriesStore::open_existing(&db_path),
            Err(SourceError::InputNotFound(_))
        ));
        assert!(!db_path.exists());
    }

    #[test]
    fn test_read_only_source_reads_existing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("readings.db");
        SqliteSeriesStore::new(&db_path)
            .unwrap()
            .store_series("readings", "level", &[Some(2.0), None])
            .unwrap();

        let source = SqliteSeriesSource::open(&db_path, "readings", "level").unwrap();
        assert_eq!(source.read_series().unwrap(), vec![Some(2.0), None]);

        let mut read_only = SqliteSeriesStore::open_read_only(&db_path).unwrap();
        assert!(matches!(
            read_only.store_series("readings", "level", &[Some(1.0)]),
            Err(SourceError::Sqlite(_))
        ));
    }

    #[test]
    fn test_missing_column_is_sql_error() {
        let store = store_with_readings();
        assert!(matches!(
            store.read_column("readings", "absent"),
            Err(SourceError::Sqlite(_))
        ));
    }

    #[test]
    fn test_store_series_replaces_previous_rows() {
        let mut store = SqliteSeriesStore::new_in_memory().unwrap();
        store
            .store_series("output", "mean", &[Some(1.0), Some(2.0), Some(3.0)])
            .unwrap();
        store.store_series("output", "mean", &[Some(5.0), None]).unwrap();

        let series = store.read_column("output", "mean").unwrap();
        assert_eq!(series, vec![Some(5.0), None]);
    }
}
