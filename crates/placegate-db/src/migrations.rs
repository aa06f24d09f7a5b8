use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            username    TEXT PRIMARY KEY,
            salt        TEXT NOT NULL,
            passhash    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS searches (
            sessionid       TEXT NOT NULL,
            timestamp       TEXT NOT NULL,
            searchtype      TEXT NOT NULL,
            username        TEXT,
            query           TEXT,
            location        TEXT,
            radius          TEXT,
            keyword         TEXT,
            language        TEXT,
            minprice        TEXT,
            maxprice        TEXT,
            name            TEXT,
            opennow         TEXT,
            rankby          TEXT,
            types           TEXT,
            pagetoken       TEXT,
            zagatselected   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_searches_timestamp
            ON searches(timestamp);

        CREATE TABLE IF NOT EXISTS results (
            sessionid   TEXT NOT NULL,
            timestamp   TEXT NOT NULL,
            username    TEXT,
            placeid     TEXT NOT NULL,
            lat         REAL NOT NULL,
            lng         REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_results_timestamp
            ON results(timestamp);
        ",
    )?;

    info!("Store migrations complete");
    Ok(())
}
