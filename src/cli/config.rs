use std::path::Path;

use crate::cli::output;
use crate::config::Config;
use crate::error::Result;

/// Validate the configuration file without connecting anything.
pub fn execute_config<P: AsRef<Path>>(config_path: P) -> Result<()> {
    let path = config_path.as_ref();
    let config = Config::load(path)?;

    output::ok(&format!("Configuration file is valid: {}", path.display()));
    output::section("Logging");
    output::key_value("Level", &config.logging.level);
    output::key_value("Format", &config.logging.format);

    output::section("Databases");
    if config.databases.is_empty() {
        println!("(none configured)");
    }
    for db in &config.databases {
        println!();
        output::key_value("Tag", &db.tag);
        output::key_value("Dialect", db.dialect);
        output::key_value("URL", &db.url);
        output::key_value("Max open", db.max_open_conns);
        if let Some(idle) = db.max_idle_conns {
            output::key_value("Max idle", idle);
        }
        if let Some(secs) = db.conn_max_lifetime_secs {
            output::key_value("Lifetime", format!("{secs}s"));
        }
        if let Some(log_file) = &db.log_file {
            output::key_value("SQL log", log_file.display());
        }
    }

    Ok(())
}
