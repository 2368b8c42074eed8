//! Action engine: applies a rule table to one record.

use tracing::{debug, trace};

use crate::dicom::dict;
use crate::dicom::record::{DicomFile, Record, Value};
use crate::error::Result;
use crate::rules::{Action, ReplaceMap, Rule, RuleTable};
use crate::sink::{ArchiveRecord, ArchiveSink};
use crate::tag::Tag;

/// Counts of field instances touched by [`apply`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub archived: usize,
    pub replaced: usize,
    pub deleted: usize,
}

/// Apply every rule to `file`, in rule-table order, each rule's actions in
/// archive, replace, delete order.
///
/// Addresses that do not resolve are skipped. An error means the record was
/// left in an unspecified state and must not be saved.
pub fn apply(
    file: &mut DicomFile,
    rules: &RuleTable,
    replacements: &ReplaceMap,
    source: &str,
    sink: &mut dyn ArchiveSink,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    for rule in rules.iter() {
        for action in &rule.actions {
            apply_action(file, rule, *action, replacements, source, sink, &mut report)?;
        }
    }
    debug!(
        source,
        archived = report.archived,
        replaced = report.replaced,
        deleted = report.deleted,
        "applied rules"
    );
    Ok(report)
}

fn apply_action(
    file: &mut DicomFile,
    rule: &Rule,
    action: Action,
    replacements: &ReplaceMap,
    source: &str,
    sink: &mut dyn ArchiveSink,
    report: &mut ApplyReport,
) -> Result<()> {
    let Some((parents, leaf)) = rule.address.split_last() else {
        return Ok(());
    };
    if dict::is_pixel_data(leaf) {
        return Ok(());
    }
    let root = if rule.address.is_file_meta() {
        &mut file.meta
    } else {
        &mut file.dataset
    };
    let containers = resolve_containers(root, parents);
    trace!(key = %rule.key, action = action.as_str(), containers = containers.len(), "resolved");

    match action {
        Action::Archive => {
            for container in containers {
                if let Some(element) = container.get(leaf) {
                    let value = element.value_text().into_archive_string();
                    sink.append(&ArchiveRecord::new(source, &rule.key, value))?;
                    report.archived += 1;
                }
            }
        }
        Action::Replace => {
            let Some(value) = replacements.get(&rule.key) else {
                return Ok(());
            };
            for container in containers {
                if let Some(element) = container.get_mut(leaf) {
                    element.set_text(value)?;
                    report.replaced += 1;
                }
            }
        }
        Action::Delete => {
            for container in containers {
                if container.remove(leaf).is_some() {
                    report.deleted += 1;
                }
            }
        }
    }
    Ok(())
}

/// Records that own the terminal field of an address.
///
/// Each intermediate tag fans out through every item of a sequence, or into a
/// nested record. A missing or scalar intermediate contributes nothing.
pub fn resolve_containers<'a>(root: &'a mut Record, parents: &[Tag]) -> Vec<&'a mut Record> {
    let mut targets = vec![root];
    for tag in parents {
        let mut next = Vec::new();
        for record in targets {
            let Some(element) = record.get_mut(*tag) else {
                continue;
            };
            match &mut element.value {
                Value::Sequence(seq) => next.extend(seq.items.iter_mut()),
                Value::Nested(inner) => next.push(inner),
                Value::Scalar(_) => {}
            }
        }
        targets = next;
    }
    targets
}
