use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rusqlite::types::ValueRef;
use serde_json::Value;
use uuid::Uuid;

use placegate_types::api::PlaceResult;
use placegate_types::models::SearchRecord;

use crate::Store;
use crate::models::CredentialRow;
use crate::statement::QueryStatement;

const INSERT_SEARCH: &str = "INSERT INTO searches (sessionid, timestamp, searchtype, username, \
     query, location, radius, keyword, language, minprice, maxprice, name, opennow, rankby, \
     types, pagetoken, zagatselected) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)";
const INSERT_RESULT: &str = "INSERT INTO results (sessionid, timestamp, username, placeid, lat, \
     lng) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const ADD_USER: &str = "INSERT INTO users (username, salt, passhash) VALUES (?1, ?2, ?3)";
const CREDENTIAL: &str = "SELECT salt, passhash FROM users WHERE username = ?1 LIMIT 1";

impl Store {
    // -- Users --

    /// Insert a new user row. A duplicate username violates the primary key
    /// and surfaces as an error for the caller to report.
    pub fn add_user(&self, username: &str, salt: &str, passhash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(ADD_USER, (username, salt, passhash))?;
            Ok(())
        })
    }

    pub fn credential(&self, username: &str) -> Result<Option<CredentialRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(CREDENTIAL)?;
            let row = stmt
                .query_row([username], |row| {
                    Ok(CredentialRow {
                        salt: row.get(0)?,
                        passhash: row.get(1)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    // -- Searches and results --

    pub fn insert_search(&self, record: &SearchRecord) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                INSERT_SEARCH,
                rusqlite::params![
                    record.session_id.to_string(),
                    record.timestamp,
                    record.kind.as_str(),
                    record.username,
                    record.query,
                    record.location,
                    record.radius,
                    record.keyword,
                    record.language,
                    record.minprice,
                    record.maxprice,
                    record.name,
                    record.opennow,
                    record.rankby,
                    record.types,
                    record.pagetoken,
                    record.zagatselected,
                ],
            )?;
            Ok(())
        })
    }

    /// Insert one row per result, sequentially, with no enclosing
    /// transaction: a failure partway through leaves the earlier rows
    /// committed. Returns the number of rows written.
    pub fn insert_results(
        &self,
        session_id: Uuid,
        timestamp: &str,
        username: Option<&str>,
        results: &[PlaceResult],
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let session = session_id.to_string();
            let mut stmt = conn.prepare(INSERT_RESULT)?;
            let mut written = 0;
            for result in results {
                stmt.execute(rusqlite::params![
                    session,
                    timestamp,
                    username,
                    result.place_id,
                    result.geometry.location.lat,
                    result.geometry.location.lng,
                ])?;
                written += 1;
            }
            Ok(written)
        })
    }

    // -- Dynamic queries --

    /// Execute a built statement and marshal every row to a map of
    /// lower-cased column name to JSON value, in cursor order. No matches
    /// is an empty vec, not an error.
    pub fn execute_query(
        &self,
        statement: &QueryStatement,
    ) -> Result<Vec<serde_json::Map<String, Value>>> {
        self.with_conn(|conn| {
            let mut prepared = conn.prepare(statement.sql())?;
            let columns: Vec<String> = prepared
                .column_names()
                .iter()
                .map(|name| name.to_lowercase())
                .collect();

            let mut rows = prepared.query(rusqlite::params_from_iter(statement.params().iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut object = serde_json::Map::new();
                for (i, column) in columns.iter().enumerate() {
                    object.insert(column.clone(), column_value(row.get_ref(i)?));
                }
                out.push(object);
            }
            Ok(out)
        })
    }
}

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::String(STANDARD.encode(blob)),
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
