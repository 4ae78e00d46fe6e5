use clap::Parser;
use sheetwise::args::{Args, Command};
use sheetwise::{commands, Mode, Result};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with {} error: {e}", e.error_type());
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().sheetwise_home().path();

    // When SHEETWISE_DEMO is set and non-empty the mode is Mode::Demo and Google is never
    // contacted, otherwise it is Mode::Google.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => commands::init(home, init_args).await?.print(),

        Command::Auth(auth_args) => {
            if auth_args.verify() {
                commands::auth_verify(home).await?.print()
            } else {
                commands::auth(home).await?.print()
            }
        }

        Command::Months => commands::months(home, mode).await?.print(),

        Command::List(list_args) => commands::list(home, mode, list_args).await?.print(),

        Command::Add(add_args) => commands::add(home, mode, add_args).await?.print(),

        Command::Bulk(bulk_args) => commands::bulk(home, mode, bulk_args).await?.print(),

        Command::Update(update_args) => commands::update(home, mode, update_args).await?.print(),

        Command::Delete(delete_args) => commands::delete(home, mode, delete_args).await?.print(),

        Command::Search(search_args) => commands::search(home, mode, search_args).await?.print(),
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        // RUST_LOG wins when it is set.
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(format!(
            "{}={},{}={}",
            env!("CARGO_CRATE_NAME"),
            level,
            env!("CARGO_BIN_NAME"),
            level
        )),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
