//! Connectivity checks and raw database statements.

use std::path::Path;

use crate::cli::output;
use crate::db::{delete_database_file, Registry};
use crate::error::{Error, Result};

/// Ping `tag`, or every registered tag when none is given.
pub fn execute_ping(registry: &Registry, tag: Option<&str>) -> Result<()> {
    let tags = match tag {
        Some(tag) => vec![tag.to_string()],
        None => registry.tags(),
    };

    let mut failed = 0;
    for tag in &tags {
        output::progress(&format!("Pinging {tag}"));
        let result = registry.ping(tag);
        output::progress_done(result.is_ok());
        if let Err(e) = result {
            output::error(&format!("{tag}: {e}"));
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(Error::Connection(format!(
            "{failed} of {} databases unreachable",
            tags.len()
        )));
    }
    Ok(())
}

/// Run a raw statement on `tag`.
pub fn execute_exec(registry: &Registry, tag: &str, sql: &str) -> Result<()> {
    let rows = registry.execute_raw(tag, sql)?;
    output::ok(&format!("{rows} rows affected"));
    Ok(())
}

pub fn execute_create_database(registry: &Registry, tag: &str, name: &str, owner: &str) -> Result<()> {
    registry.create_database(tag, name, owner)?;
    output::ok(&format!("Created database {name} owned by {owner}"));
    Ok(())
}

pub fn execute_drop_database(registry: &Registry, tag: &str, name: &str) -> Result<()> {
    registry.drop_database(tag, name)?;
    output::ok(&format!("Dropped database {name}"));
    Ok(())
}

pub fn execute_delete_file(path: &Path) -> Result<()> {
    delete_database_file(path)?;
    output::ok(&format!("Deleted {}", path.display()));
    Ok(())
}
