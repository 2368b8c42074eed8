use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "dcmdeid: imaging record de-identification", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inventory the fields and distinct values found in a folder of records
    Scan {
        /// folder searched recursively, including zip and tar containers
        #[arg(short, long, default_value = ".")]
        folder: PathBuf,
        /// CSV file receiving one row per field
        #[arg(short, long = "target-file", default_value = "dicom_fields.csv")]
        target_file: PathBuf,
        /// maximum number of distinct values listed per field
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Apply a rule file to every record in a folder
    Deid {
        /// folder searched recursively, including zip and tar containers
        #[arg(short, long)]
        folder: Option<PathBuf>,
        /// rule file (`<address> > <action>` per line)
        #[arg(short, long = "param-file")]
        param_file: Option<PathBuf>,
        /// CSV file receiving archived values and renames
        #[arg(short, long = "archive-file")]
        archive_file: Option<PathBuf>,
        /// mirror results here instead of overwriting in place
        #[arg(short, long = "output-folder")]
        output_folder: Option<PathBuf>,
        /// rename saved records and tag output containers with this extension
        #[arg(short, long)]
        extension: Option<String>,
        /// YYYYMMDD date written into cleared date fields
        #[arg(short = 'd', long = "replacement-date")]
        replacement_date: Option<String>,
        /// JSON file with run options; flags given here override it
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_defaults() {
        let cli = Cli::try_parse_from(["dcmdeid", "scan"]).unwrap();
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Commands::Scan {
                folder,
                target_file,
                limit,
            } => {
                assert_eq!(folder, PathBuf::from("."));
                assert_eq!(target_file, PathBuf::from("dicom_fields.csv"));
                assert_eq!(limit, 20);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn deid_flags_and_verbosity() {
        let cli = Cli::try_parse_from([
            "dcmdeid",
            "-vv",
            "deid",
            "--folder",
            "in",
            "-p",
            "rules.txt",
            "--output-folder",
            "out",
            "--extension",
            "anon",
            "-d",
            "20000101",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Deid {
                folder,
                param_file,
                archive_file,
                output_folder,
                extension,
                replacement_date,
                config,
            } => {
                assert_eq!(folder, Some(PathBuf::from("in")));
                assert_eq!(param_file, Some(PathBuf::from("rules.txt")));
                assert_eq!(archive_file, None);
                assert_eq!(output_folder, Some(PathBuf::from("out")));
                assert_eq!(extension.as_deref(), Some("anon"));
                assert_eq!(replacement_date.as_deref(), Some("20000101"));
                assert!(config.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(Cli::try_parse_from(["dcmdeid", "pack"]).is_err());
    }
}
