//! Pool status table.

use tabled::{Table, Tabled};

use crate::cli::output;
use crate::db::Registry;
use crate::error::Result;

#[derive(Tabled)]
struct PoolRow {
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Connections")]
    connections: u32,
    #[tabled(rename = "Idle")]
    idle: u32,
    #[tabled(rename = "Max Open")]
    max_open: u32,
}

/// Show pool state for every registered tag.
pub fn execute_status(registry: &Registry) -> Result<()> {
    let rows = registry
        .tags()
        .iter()
        .map(|tag| {
            registry.stats(tag).map(|stats| PoolRow {
                tag: stats.tag,
                connections: stats.connections,
                idle: stats.idle_connections,
                max_open: stats.max_open_conns,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    output::section("Connection pools");
    if rows.is_empty() {
        println!("(no databases configured)");
        return Ok(());
    }

    let table = Table::new(rows).to_string();
    for line in table.lines() {
        println!("  {line}");
    }
    Ok(())
}
