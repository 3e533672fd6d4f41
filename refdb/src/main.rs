//! Entrypoint of the refdb binary
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr,
    clippy::future_not_send
)]

use dotenvy::dotenv;
use std::error::Error;

mod commands {
    pub(crate) mod common;
    pub(crate) mod convert;
    pub(crate) mod info;
    pub(crate) mod remove;
    pub(crate) mod update;
}

enum ReturnCode {
    Failure = 1,
}

#[derive(Debug, clap::Parser)]
#[clap(
    name = "refdb",
    version,
    about = "Reference catalog database tools",
    long_about = r#"Reference catalog database tools

Examples:
    # Show what a database file contains
    refdb info ~/.refdb/database-v12

    # Rewrite an old database file in the current format
    refdb convert database-v9 database-v12

    # Download the catalog if the local copy is older than a day
    refdb update --url https://example.com/refdb/database-v12 --data-dir ~/.refdb --interval 1d

    # Same, with full debug logging specified with LOG_FILTER
    LOG_FILTER=debug refdb update --url https://example.com/refdb/database-v12 --data-dir ~/.refdb
"#
)]
struct Config {
    #[clap(flatten)]
    logging_config: commands::common::LoggingConfig,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Print the contents summary and consistency issues of a database file
    Info(commands::info::Config),

    /// Load a database file of any supported version and write it in the latest format
    Convert(commands::convert::Config),

    /// Refresh the local database from the remote source
    Update(commands::update::Config),

    /// Delete the local database files
    Remove(commands::remove::Config),
}

fn main() -> Result<(), std::io::Error> {
    // load all environment variables from .env before doing anything
    load_dotenv();

    let config: Config = clap::Parser::parse();

    if let Err(e) = commands::common::init_logs(&config.logging_config) {
        eprintln!("Initializing logs failed: {e}");
        std::process::exit(ReturnCode::Failure as _);
    }

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    tokio_runtime.block_on(async move {
        fn exit_on_error(name: &str, r: Result<(), Box<dyn Error>>) {
            if let Err(e) = r {
                eprintln!("{name} command failed: {e}");
                std::process::exit(ReturnCode::Failure as _)
            }
        }

        match config.command {
            None => println!("command required, -h/--help for help"),
            Some(Command::Info(config)) => exit_on_error("Info", commands::info::command(config)),
            Some(Command::Convert(config)) => {
                exit_on_error("Convert", commands::convert::command(config))
            }
            Some(Command::Update(config)) => {
                exit_on_error("Update", commands::update::command(config).await)
            }
            Some(Command::Remove(config)) => {
                exit_on_error("Remove", commands::remove::command(config))
            }
        }
    });

    Ok(())
}

/// Source the .env file before initialising the Config struct, so values from the file become
/// defaults for the `env` backed flags.
///
/// Precedence is given to existing env variables.
fn load_dotenv() {
    match dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            eprintln!("FATAL Error loading config from: {e}");
            eprintln!("Aborting");
            std::process::exit(ReturnCode::Failure as _);
        }
    };
}
