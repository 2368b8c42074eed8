//! The two user-facing commands: field inventory scan and de-identification.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actions::apply;
use crate::dates::strip_dates;
use crate::discover::walker::{DiscoverOptions, DiscoverSummary, discover};
use crate::error::{DeidError, Result};
use crate::output::EngineState;
use crate::rules::parse_rules_file;
use crate::scan::FieldInventory;
use crate::sink::{CsvSink, NullSink};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub folder: PathBuf,
    pub target_file: PathBuf,
    /// Maximum number of distinct values written per field.
    pub limit: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            target_file: PathBuf::from("dicom_fields.csv"),
            limit: 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeidOptions {
    pub folder: PathBuf,
    pub param_file: Option<PathBuf>,
    pub archive_file: PathBuf,
    pub output_folder: Option<PathBuf>,
    /// Non-empty means saved records get synthetic names.
    pub extension: String,
    pub replacement_date: Option<String>,
}

impl Default for DeidOptions {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("."),
            param_file: Some(PathBuf::from("deidparam.txt")),
            archive_file: PathBuf::from("archive.csv"),
            output_folder: None,
            extension: String::new(),
            replacement_date: None,
        }
    }
}

impl DeidOptions {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Inventory every field across the records under `opts.folder`.
pub fn run_scan(opts: &ScanOptions) -> Result<DiscoverSummary> {
    const FUNCTION: &str = "get_dicom_fields";
    let folder = opts.folder.display().to_string();
    let target = opts.target_file.display().to_string();

    if !opts.folder.exists() {
        return Err(DeidError::command_failed(
            FUNCTION,
            "Folder not found",
            &[
                "The specified folder with DICOM files to analyse was not found:",
                folder.as_str(),
                "Please check your paths!",
            ],
        ));
    }
    fs::File::create(&opts.target_file).map_err(|_| {
        DeidError::command_failed(
            FUNCTION,
            "Could not create target file",
            &[
                "The specified target file could not be created:",
                target.as_str(),
                "Please check your paths and permissions!",
            ],
        )
    })?;

    let mut inventory = FieldInventory::new();
    let mut state = EngineState::new();
    let summary = discover(
        &opts.folder,
        &DiscoverOptions::default(),
        &mut state,
        &mut NullSink,
        |file, _| {
            inventory.add(file);
            Ok(())
        },
    )?;
    inventory.write_csv(&opts.target_file, opts.limit)?;
    info!(fields = inventory.len(), target = %target, "wrote field inventory");
    Ok(summary)
}

/// Apply a rule file to every record under `opts.folder` and save the results.
pub fn run_deid(opts: &DeidOptions) -> Result<DiscoverSummary> {
    const FUNCTION: &str = "change_dicom_files";
    let folder = opts.folder.display().to_string();

    if !opts.folder.exists() {
        return Err(DeidError::command_failed(
            FUNCTION,
            "Folder not found",
            &[
                "The specified folder with DICOM files to change was not found:",
                folder.as_str(),
                "Please check your paths!",
            ],
        ));
    }
    let Some(param_file) = opts
        .param_file
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
    else {
        return Err(DeidError::command_error(
            FUNCTION,
            "No parameter file specified",
            &[
                "No parameter file information was provided.",
                "Please provide a parameter file that describes the changes to be made!",
            ],
        ));
    };
    if !param_file.exists() {
        return Err(DeidError::command_failed(
            FUNCTION,
            "Parameter file not found",
            &[
                "The specified parameter file was not found:",
                param_file.display().to_string().as_str(),
                "Please check your paths!",
            ],
        ));
    }

    let sink = CsvSink::new(&opts.archive_file);
    sink.touch().map_err(|_| {
        DeidError::command_failed(
            FUNCTION,
            "Could not create archive file",
            &[
                "The specified archive file could not be created:",
                opts.archive_file.display().to_string().as_str(),
                "Please check your paths and permissions!",
            ],
        )
    })?;
    if let Some(out) = &opts.output_folder {
        fs::create_dir_all(out).map_err(|_| {
            DeidError::command_failed(
                FUNCTION,
                "Could not create output folder",
                &[
                    "The specified output folder could not be created:",
                    out.display().to_string().as_str(),
                    "Please check your paths and permissions!",
                ],
            )
        })?;
    }

    let (rules, replacements) = parse_rules_file(param_file)?;
    info!(rules = rules.len(), "loaded rule file");

    let discover_opts = DiscoverOptions {
        output_root: opts.output_folder.clone(),
        rename: !opts.extension.is_empty(),
        extension: opts.extension.clone(),
        save: true,
    };
    let mut state = EngineState::new();
    let mut rename_sink = sink.clone();
    let mut archive_sink = sink;
    let replacement_date = opts.replacement_date.as_deref();
    discover(
        &opts.folder,
        &discover_opts,
        &mut state,
        &mut rename_sink,
        |file, ident| {
            apply(file, &rules, &replacements, ident, &mut archive_sink)?;
            strip_dates(file, replacement_date);
            Ok(())
        },
    )
}
