use clap::Parser;
use tagdb::cli::{self, output, Cli, Commands};
use tagdb::config::Config;
use tagdb::db::Registry;
use tagdb::error::Result;

fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Config => return cli::config::execute_config(&cli.config),
        Commands::DeleteFile(args) => return cli::database::execute_delete_file(&args.path),
        _ => {}
    }

    let config = Config::load(&cli.config)?;
    config.init_logging();

    let registry = Registry::global();
    registry.connect_all(&config)?;

    match cli.command {
        Commands::Status => cli::status::execute_status(registry),
        Commands::Ping(args) => cli::database::execute_ping(registry, args.tag.as_deref()),
        Commands::Exec(args) => cli::database::execute_exec(registry, &args.tag, &args.sql),
        Commands::CreateDatabase(args) => {
            cli::database::execute_create_database(registry, &args.tag, &args.name, &args.owner)
        }
        Commands::DropDatabase(args) => {
            cli::database::execute_drop_database(registry, &args.tag, &args.name)
        }
        Commands::Config | Commands::DeleteFile(_) => Ok(()),
    }
}
