pub mod handlers;
pub mod logging;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;
use dcmdeid_core::error::Result;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match cli.command {
        Commands::Scan {
            folder,
            target_file,
            limit,
        } => handlers::handle_scan(folder, target_file, limit),
        Commands::Deid {
            folder,
            param_file,
            archive_file,
            output_folder,
            extension,
            replacement_date,
            config,
        } => handlers::handle_deid(
            folder,
            param_file,
            archive_file,
            output_folder,
            extension,
            replacement_date,
            config,
        ),
    }
}
