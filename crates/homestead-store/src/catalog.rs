//! SQLite catalog of origins, packages and channels
//!
//! Features:
//! - WAL mode for concurrent readers
//! - Foreign keys so channel memberships follow their packages
//! - Packages and their `unstable` membership are written in one transaction

use chrono::{DateTime, TimeZone, Utc};
use homestead_core::{PackageIdent, PackageTarget};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use std::path::Path;

use crate::error::{Result, StoreError};

/// A package row
#[derive(Debug, Clone)]
pub struct PackageRecord {
    pub id: i64,
    pub ident: PackageIdent,
    pub target: PackageTarget,
    /// SHA256 of the artifact file
    pub checksum: String,
    /// Artifact path relative to the store root
    pub archive: String,
    pub deps: Vec<PackageIdent>,
    pub build_deps: Vec<PackageIdent>,
    pub uploaded: DateTime<Utc>,
}

/// Fields needed to index a new package
#[derive(Debug, Clone)]
pub struct NewPackage<'a> {
    pub ident: &'a PackageIdent,
    pub target: PackageTarget,
    pub checksum: &'a str,
    pub archive: &'a str,
    pub deps: &'a [PackageIdent],
    pub build_deps: &'a [PackageIdent],
}

const PACKAGE_COLUMNS: &str = "p.id, p.origin, p.name, p.version, p.release, p.target, \
                               p.checksum, p.archive, p.deps, p.build_deps, p.uploaded";

pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open or create the catalog at a specific path
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| StoreError::Catalog {
            message: format!("cannot open {}: {}", path.display(), e),
        })?;

        let catalog = Self { conn };
        catalog.init(true).inspect_err(|e| {
            tracing::warn!(path = %path.display(), "catalog unusable: {}", e);
        })?;
        Ok(catalog)
    }

    /// Open an in-memory catalog (for testing)
    pub fn open_memory() -> Result<Self> {
        let catalog = Self {
            conn: Connection::open_in_memory()?,
        };
        catalog.init(false)?;
        Ok(catalog)
    }

    fn init(&self, wal: bool) -> Result<()> {
        if wal {
            self.conn.pragma_update(None, "journal_mode", "WAL")?;
            self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS origins (
                id INTEGER PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                token_sha256 TEXT NOT NULL,
                created INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY,
                origin TEXT NOT NULL REFERENCES origins(name),
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                release TEXT NOT NULL,
                target TEXT NOT NULL,
                checksum TEXT NOT NULL,
                archive TEXT NOT NULL,
                deps TEXT NOT NULL,
                build_deps TEXT NOT NULL,
                uploaded INTEGER NOT NULL,
                UNIQUE(origin, name, version, release, target)
            );

            CREATE TABLE IF NOT EXISTS channels (
                id INTEGER PRIMARY KEY,
                origin TEXT NOT NULL REFERENCES origins(name),
                name TEXT NOT NULL,
                UNIQUE(origin, name)
            );

            CREATE TABLE IF NOT EXISTS channel_packages (
                channel_id INTEGER NOT NULL REFERENCES channels(id) ON DELETE CASCADE,
                package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
                PRIMARY KEY (channel_id, package_id)
            );

            CREATE INDEX IF NOT EXISTS idx_packages_origin_name ON packages(origin, name);
            CREATE INDEX IF NOT EXISTS idx_channel_packages_package ON channel_packages(package_id);
            "#,
        )?;

        Ok(())
    }

    // ============ Origins ============

    pub fn insert_origin(&self, name: &str, token_sha256: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO origins (name, token_sha256, created) VALUES (?1, ?2, ?3)",
            params![name, token_sha256, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn origin_token(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT token_sha256 FROM origins WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn origins(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM origins ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    // ============ Packages ============

    /// Index a package and add it to `channel` in one transaction
    pub fn insert_package(&mut self, pkg: &NewPackage<'_>, channel: &str) -> Result<i64> {
        let (version, release) = fully_qualified_parts(pkg.ident)?;
        let deps = serde_json::to_string(pkg.deps)?;
        let build_deps = serde_json::to_string(pkg.build_deps)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO packages (origin, name, version, release, target, checksum, archive, deps, build_deps, uploaded)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                pkg.ident.origin,
                pkg.ident.name,
                version,
                release,
                pkg.target.as_str(),
                pkg.checksum,
                pkg.archive,
                deps,
                build_deps,
                Utc::now().timestamp(),
            ],
        )?;
        let package_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT OR IGNORE INTO channels (origin, name) VALUES (?1, ?2)",
            params![pkg.ident.origin, channel],
        )?;
        tx.execute(
            r#"
            INSERT INTO channel_packages (channel_id, package_id)
            SELECT id, ?3 FROM channels WHERE origin = ?1 AND name = ?2
            "#,
            params![pkg.ident.origin, channel, package_id],
        )?;

        tx.commit()?;
        Ok(package_id)
    }

    /// Look up a fully qualified package for a target
    pub fn find_package(
        &self,
        ident: &PackageIdent,
        target: PackageTarget,
    ) -> Result<Option<PackageRecord>> {
        let (version, release) = fully_qualified_parts(ident)?;
        let sql = format!(
            "SELECT {} FROM packages p \
             WHERE p.origin = ?1 AND p.name = ?2 AND p.version = ?3 AND p.release = ?4 AND p.target = ?5",
            PACKAGE_COLUMNS
        );
        let record = self
            .conn
            .query_row(
                &sql,
                params![ident.origin, ident.name, version, release, target.as_str()],
                read_package,
            )
            .optional()?;
        Ok(record)
    }

    /// Every fully qualified ident of `origin/name` for a target
    ///
    /// Restricted to members of `channel` when one is given.
    pub fn candidates(
        &self,
        origin: &str,
        name: &str,
        target: PackageTarget,
        channel: Option<&str>,
    ) -> Result<Vec<PackageIdent>> {
        let records = match channel {
            Some(channel) => {
                let sql = format!(
                    "SELECT {} FROM packages p \
                     JOIN channel_packages cp ON cp.package_id = p.id \
                     JOIN channels c ON c.id = cp.channel_id \
                     WHERE p.origin = ?1 AND p.name = ?2 AND p.target = ?3 AND c.name = ?4",
                    PACKAGE_COLUMNS
                );
                self.query_packages(&sql, params![origin, name, target.as_str(), channel])?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM packages p \
                     WHERE p.origin = ?1 AND p.name = ?2 AND p.target = ?3",
                    PACKAGE_COLUMNS
                );
                self.query_packages(&sql, params![origin, name, target.as_str()])?
            }
        };
        Ok(records.into_iter().map(|r| r.ident).collect())
    }

    /// Distinct `origin/name` pairs in the catalog
    pub fn package_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT origin || '/' || name FROM packages ORDER BY 1",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Packages of an origin, optionally narrowed to one name
    pub fn list(&self, origin: &str, name: Option<&str>) -> Result<Vec<PackageRecord>> {
        let sql = format!(
            "SELECT {} FROM packages p \
             WHERE p.origin = ?1 AND (?2 IS NULL OR p.name = ?2) \
             ORDER BY p.name, p.id",
            PACKAGE_COLUMNS
        );
        self.query_packages(&sql, params![origin, name])
    }

    /// Packages whose `origin/name` contains `query`
    pub fn search(&self, query: &str) -> Result<Vec<PackageRecord>> {
        let pattern = format!("%{}%", escape_like(query));
        let sql = format!(
            "SELECT {} FROM packages p \
             WHERE (p.origin || '/' || p.name) LIKE ?1 ESCAPE '\\' \
             ORDER BY p.origin, p.name, p.id \
             LIMIT 100",
            PACKAGE_COLUMNS
        );
        self.query_packages(&sql, params![pattern])
    }

    fn query_packages<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<PackageRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records = stmt
            .query_map(params, read_package)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // ============ Channels ============

    pub fn channel_id(&self, origin: &str, channel: &str) -> Result<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM channels WHERE origin = ?1 AND name = ?2",
                params![origin, channel],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Create a channel if missing, returning its id
    pub fn ensure_channel(&self, origin: &str, channel: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO channels (origin, name) VALUES (?1, ?2)",
            params![origin, channel],
        )?;
        self.channel_id(origin, channel)?
            .ok_or_else(|| StoreError::ChannelNotFound {
                origin: origin.to_string(),
                channel: channel.to_string(),
            })
    }

    /// Returns `false` when the package was already a member
    pub fn add_to_channel(&self, channel_id: i64, package_id: i64) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO channel_packages (channel_id, package_id) VALUES (?1, ?2)",
            params![channel_id, package_id],
        )?;
        Ok(inserted > 0)
    }

    /// Returns `false` when the package was not a member
    pub fn remove_from_channel(&self, channel_id: i64, package_id: i64) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM channel_packages WHERE channel_id = ?1 AND package_id = ?2",
            params![channel_id, package_id],
        )?;
        Ok(removed > 0)
    }

    pub fn channels_for(&self, package_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.name FROM channels c
            JOIN channel_packages cp ON cp.channel_id = c.id
            WHERE cp.package_id = ?1
            ORDER BY c.name
            "#,
        )?;
        let names = stmt
            .query_map([package_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

fn fully_qualified_parts(ident: &PackageIdent) -> Result<(&str, &str)> {
    match (&ident.version, &ident.release) {
        (Some(version), Some(release)) => Ok((version.as_str(), release.as_str())),
        _ => Err(homestead_core::CoreError::NotFullyQualified {
            ident: ident.to_string(),
        }
        .into()),
    }
}

fn read_package(row: &Row<'_>) -> rusqlite::Result<PackageRecord> {
    let ident = PackageIdent {
        origin: row.get(1)?,
        name: row.get(2)?,
        version: Some(row.get(3)?),
        release: Some(row.get(4)?),
    };
    let target: String = row.get(5)?;
    let deps: String = row.get(8)?;
    let build_deps: String = row.get(9)?;
    let uploaded: i64 = row.get(10)?;

    Ok(PackageRecord {
        id: row.get(0)?,
        ident,
        target: target.parse().map_err(|e| conversion_error(5, e))?,
        checksum: row.get(6)?,
        archive: row.get(7)?,
        deps: serde_json::from_str(&deps).map_err(|e| conversion_error(8, e))?,
        build_deps: serde_json::from_str(&build_deps).map_err(|e| conversion_error(9, e))?,
        uploaded: Utc
            .timestamp_opt(uploaded, 0)
            .single()
            .unwrap_or_default(),
    })
}

fn conversion_error<E>(column: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> PackageIdent {
        s.parse().unwrap()
    }

    fn insert(catalog: &mut Catalog, s: &str) -> i64 {
        let ident = ident(s);
        catalog
            .insert_package(
                &NewPackage {
                    ident: &ident,
                    target: PackageTarget::X86_64Linux,
                    checksum: "abc",
                    archive: "pkgs/x.hpkg",
                    deps: &[],
                    build_deps: &[],
                },
                "unstable",
            )
            .unwrap()
    }

    fn catalog() -> Catalog {
        let catalog = Catalog::open_memory().unwrap();
        catalog.insert_origin("core", "hash").unwrap();
        catalog
    }

    #[test]
    fn test_origins() {
        let catalog = catalog();
        assert_eq!(catalog.origin_token("core").unwrap().as_deref(), Some("hash"));
        assert!(catalog.origin_token("acme").unwrap().is_none());
        assert!(catalog.insert_origin("core", "other").is_err());
        assert_eq!(catalog.origins().unwrap(), vec!["core".to_string()]);
    }

    #[test]
    fn test_insert_and_find() {
        let mut catalog = catalog();
        let id = insert(&mut catalog, "core/redis/7.2.4/20240101120000");

        let found = catalog
            .find_package(&ident("core/redis/7.2.4/20240101120000"), PackageTarget::X86_64Linux)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.checksum, "abc");
        assert_eq!(catalog.channels_for(id).unwrap(), vec!["unstable".to_string()]);

        assert!(
            catalog
                .find_package(&ident("core/redis/7.2.4/20240101120000"), PackageTarget::Aarch64Linux)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut catalog = catalog();
        insert(&mut catalog, "core/redis/7.2.4/20240101120000");
        let dup = ident("core/redis/7.2.4/20240101120000");
        let result = catalog.insert_package(
            &NewPackage {
                ident: &dup,
                target: PackageTarget::X86_64Linux,
                checksum: "abc",
                archive: "pkgs/x.hpkg",
                deps: &[],
                build_deps: &[],
            },
            "unstable",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_candidates_by_channel() {
        let mut catalog = catalog();
        let old = insert(&mut catalog, "core/redis/7.2.3/20230101120000");
        insert(&mut catalog, "core/redis/7.2.4/20240101120000");

        let stable = catalog.ensure_channel("core", "stable").unwrap();
        assert!(catalog.add_to_channel(stable, old).unwrap());
        assert!(!catalog.add_to_channel(stable, old).unwrap());

        let all = catalog
            .candidates("core", "redis", PackageTarget::X86_64Linux, None)
            .unwrap();
        assert_eq!(all.len(), 2);

        let in_stable = catalog
            .candidates("core", "redis", PackageTarget::X86_64Linux, Some("stable"))
            .unwrap();
        assert_eq!(in_stable, vec![ident("core/redis/7.2.3/20230101120000")]);

        assert!(catalog.remove_from_channel(stable, old).unwrap());
        assert!(!catalog.remove_from_channel(stable, old).unwrap());
    }

    #[test]
    fn test_search_and_list() {
        let mut catalog = catalog();
        insert(&mut catalog, "core/redis/7.2.4/20240101120000");
        insert(&mut catalog, "core/nginx/1.25.0/20240101120000");

        let found = catalog.search("red").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ident.name, "redis");

        assert!(catalog.search("%").unwrap().is_empty());
        assert_eq!(catalog.list("core", None).unwrap().len(), 2);
        assert_eq!(catalog.list("core", Some("nginx")).unwrap().len(), 1);
        assert_eq!(
            catalog.package_names().unwrap(),
            vec!["core/nginx".to_string(), "core/redis".to_string()]
        );
    }

    #[test]
    fn test_search_escapes_wildcards() {
        let mut catalog = catalog();
        insert(&mut catalog, "core/my_app/1.0.0/20240101120000");
        insert(&mut catalog, "core/myxapp/1.0.0/20240101120000");
        insert(&mut catalog, "core/100pct/1.0.0/20240101120000");

        let found = catalog.search("my_app").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ident.name, "my_app");

        assert!(catalog.search("1%").unwrap().is_empty());
        assert_eq!(catalog.search("100").unwrap().len(), 1);
    }

    #[test]
    fn test_search_is_capped() {
        let mut catalog = catalog();
        for i in 0..105 {
            insert(&mut catalog, &format!("core/tool{:03}/1.0.0/20240101120000", i));
        }

        let found = catalog.search("tool").unwrap();
        assert_eq!(found.len(), 100);
        assert_eq!(found[0].ident.name, "tool000");
        assert_eq!(found[99].ident.name, "tool099");
    }

    #[test]
    fn test_unreadable_catalog_is_kept() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("catalog.db");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();

        assert!(matches!(
            Catalog::open_at(&path),
            Err(StoreError::Catalog { .. })
        ));
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x42u8; 4096]);
    }
}
