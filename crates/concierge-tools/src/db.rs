//! Shop database: `SQLite` connection pool, migrations, demo seed.
//!
//! Uses `r2d2` connection pooling with the `r2d2_sqlite` backend. The
//! [`PragmaCustomizer`] runs on each new connection to ensure WAL mode,
//! foreign keys, and the busy timeout are set.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::info;

use crate::errors::Result;

/// Alias for the shop connection pool type.
pub type ShopPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Ordered migrations, applied by version number.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("migrations/001_shop.sql"))];

/// Configuration for the connection pool.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Maximum pool size (default: 8).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (default: 30000).
    pub busy_timeout_ms: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 30_000,
        }
    }
}

/// `SQLite` pragma customizer that runs on each new connection.
#[derive(Debug)]
struct PragmaCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA foreign_keys = ON;\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms
        ))?;
        Ok(())
    }
}

/// Create an in-memory pool (for testing and demos).
///
/// Capped at one connection: every `:memory:` open is a distinct database,
/// so a wider pool would hand out empty databases.
pub fn new_in_memory() -> Result<ShopPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .connection_timeout(std::time::Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: 5_000,
        }))
        .build(manager)?;
    let conn = pool.get()?;
    run_migrations(&conn)?;
    drop(conn);
    Ok(pool)
}

/// Create a file-backed pool and bring the schema up to date.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ShopPool> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(std::time::Duration::from_secs(5))
        .connection_customizer(Box::new(PragmaCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
        }))
        .build(manager)?;
    let conn = pool.get()?;
    run_migrations(&conn)?;
    drop(conn);
    Ok(pool)
}

/// Apply any pending migrations, each in its own transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version    INTEGER PRIMARY KEY,
             applied_at TEXT NOT NULL DEFAULT (datetime('now'))
         );",
    )?;
    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        conn.execute_batch(&format!(
            "BEGIN;\n{sql}\nINSERT INTO schema_version (version) VALUES ({version});\nCOMMIT;"
        ))?;
        info!(version, "applied shop migration");
    }
    Ok(())
}

/// Seed a small demo inventory. Idempotent: skips when products exist.
pub fn seed_demo_data(conn: &Connection) -> Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(());
    }
    conn.execute_batch(
        "INSERT INTO products (id, name, description, category, price, stock) VALUES
             (1, 'Wireless Mouse',      'Ergonomic 2.4 GHz mouse',        'Electronics', 24.99, 120),
             (2, 'Mechanical Keyboard', 'Tenkeyless, brown switches',     'Electronics', 89.50,  45),
             (3, 'USB-C Hub',           '7-in-1 hub with HDMI',           'Electronics', 39.00,  80),
             (4, 'Ceramic Mug',         '350 ml, dishwasher safe',        'Kitchen',      12.00, 200),
             (5, 'French Press',        '1 L borosilicate glass',         'Kitchen',      29.95,  60),
             (6, 'Running Shoes',       'Lightweight road trainers',      'Sports',       74.99,  35),
             (7, 'Yoga Mat',            '6 mm non-slip',                  'Sports',       19.99, 150),
             (8, 'Desk Lamp',           'Dimmable LED with USB port',     'Home',         34.50,  70);",
    )?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_pool_has_schema() {
        let pool = new_in_memory().unwrap();
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = new_in_memory().unwrap();
        let conn = pool.get().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn seed_is_idempotent() {
        let pool = new_in_memory().unwrap();
        let conn = pool.get().unwrap();
        seed_demo_data(&conn).unwrap();
        seed_demo_data(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 8);
    }

    #[test]
    fn file_pool_persists_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let config = ConnectionConfig::default();
        let pool = new_file(path.to_str().unwrap(), &config).unwrap();
        {
            let conn = pool.get().unwrap();
            seed_demo_data(&conn).unwrap();
        }
        drop(pool);

        let pool = new_file(path.to_str().unwrap(), &config).unwrap();
        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 8);
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = new_in_memory().unwrap();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO cart_items (user_id, product_id, quantity) VALUES (1, 999, 1)",
            [],
        );
        assert!(result.is_err());
    }
}
