use tagdb::config::Dialect;
use tagdb::db::Registry;
use tempfile::TempDir;

use super::models::{Post, Setting, User};

pub const TAG: &str = "test";

/// Temporary file-backed SQLite database registered under [`TAG`].
///
/// File-backed rather than `:memory:` so every pooled connection sees the
/// same tables.
pub struct TempDb {
    dir: TempDir,
    registry: Registry,
}

impl TempDb {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let url = dir.path().join("tagdb-test.db").display().to_string();

        let registry = Registry::new();
        registry
            .connect(Dialect::Sqlite, &url, TAG)
            .expect("connect sqlite pool");
        registry.migrate::<User>(TAG, false).expect("migrate users");
        registry.migrate::<Post>(TAG, false).expect("migrate posts");
        registry
            .migrate::<Setting>(TAG, false)
            .expect("migrate settings");

        Self { dir, registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn dir(&self) -> &std::path::Path {
        self.dir.path()
    }
}
