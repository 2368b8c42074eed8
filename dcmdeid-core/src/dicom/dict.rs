//! Data dictionary.
//!
//! Supplies VRs for implicit-VR decoding and display names for field paths.
//! A short table of common attributes carries the familiar spelled-out names;
//! every other public tag falls through to the standard registry, where
//! repeating groups and retired attributes are resolved too. Private tags
//! that are not creators decode as `UN`.

use std::borrow::Cow;

use dicom_core::Tag as DicomTag;
use dicom_core::dictionary::DataDictionary;
use dicom_dictionary_std::StandardDataDictionary;

use super::vr::Vr;
use crate::tag::{Tag, element, group};

pub const FILE_META_GROUP_LENGTH: Tag = 0x0002_0000;
pub const FILE_META_VERSION: Tag = 0x0002_0001;
pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = 0x0002_0002;
pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = 0x0002_0003;
pub const TRANSFER_SYNTAX_UID: Tag = 0x0002_0010;
pub const IMPLEMENTATION_CLASS_UID: Tag = 0x0002_0012;
pub const SOP_CLASS_UID: Tag = 0x0008_0016;
pub const SOP_INSTANCE_UID: Tag = 0x0008_0018;
pub const STUDY_DATE: Tag = 0x0008_0020;
pub const SERIES_DATE: Tag = 0x0008_0021;
pub const PATIENT_NAME: Tag = 0x0010_0010;
pub const PATIENT_ID: Tag = 0x0010_0020;
pub const STUDY_ID: Tag = 0x0020_0010;
pub const SERIES_NUMBER: Tag = 0x0020_0011;
pub const FLOAT_PIXEL_DATA: Tag = 0x7FE0_0008;
pub const DOUBLE_FLOAT_PIXEL_DATA: Tag = 0x7FE0_0009;
pub const PIXEL_DATA: Tag = 0x7FE0_0010;

pub const ITEM: Tag = 0xFFFE_E000;
pub const ITEM_DELIMITATION: Tag = 0xFFFE_E00D;
pub const SEQUENCE_DELIMITATION: Tag = 0xFFFE_E0DD;

#[derive(Debug)]
pub struct DictEntry {
    pub tag: Tag,
    pub vr: Vr,
    pub name: &'static str,
}

macro_rules! entries {
    ($(($tag:expr, $vr:ident, $name:expr)),* $(,)?) => {
        &[$(DictEntry { tag: $tag, vr: Vr::$vr, name: $name }),*]
    };
}

// Sorted by tag.
static ENTRIES: &[DictEntry] = entries![
    (0x0002_0000, UL, "File Meta Information Group Length"),
    (0x0002_0001, OB, "File Meta Information Version"),
    (0x0002_0002, UI, "Media Storage SOP Class UID"),
    (0x0002_0003, UI, "Media Storage SOP Instance UID"),
    (0x0002_0010, UI, "Transfer Syntax UID"),
    (0x0002_0012, UI, "Implementation Class UID"),
    (0x0002_0013, SH, "Implementation Version Name"),
    (0x0002_0016, AE, "Source Application Entity Title"),
    (0x0008_0005, CS, "Specific Character Set"),
    (0x0008_0008, CS, "Image Type"),
    (0x0008_0012, DA, "Instance Creation Date"),
    (0x0008_0013, TM, "Instance Creation Time"),
    (0x0008_0016, UI, "SOP Class UID"),
    (0x0008_0018, UI, "SOP Instance UID"),
    (0x0008_0020, DA, "Study Date"),
    (0x0008_0021, DA, "Series Date"),
    (0x0008_0022, DA, "Acquisition Date"),
    (0x0008_0023, DA, "Content Date"),
    (0x0008_002A, DT, "Acquisition DateTime"),
    (0x0008_0030, TM, "Study Time"),
    (0x0008_0031, TM, "Series Time"),
    (0x0008_0032, TM, "Acquisition Time"),
    (0x0008_0033, TM, "Content Time"),
    (0x0008_0050, SH, "Accession Number"),
    (0x0008_0060, CS, "Modality"),
    (0x0008_0070, LO, "Manufacturer"),
    (0x0008_0080, LO, "Institution Name"),
    (0x0008_0081, ST, "Institution Address"),
    (0x0008_0090, PN, "Referring Physician's Name"),
    (0x0008_1010, SH, "Station Name"),
    (0x0008_1030, LO, "Study Description"),
    (0x0008_103E, LO, "Series Description"),
    (0x0008_1040, LO, "Institutional Department Name"),
    (0x0008_1050, PN, "Performing Physician's Name"),
    (0x0008_1070, PN, "Operators' Name"),
    (0x0008_1090, LO, "Manufacturer's Model Name"),
    (0x0008_1110, SQ, "Referenced Study Sequence"),
    (0x0008_1111, SQ, "Referenced Performed Procedure Step Sequence"),
    (0x0008_1140, SQ, "Referenced Image Sequence"),
    (0x0008_1150, UI, "Referenced SOP Class UID"),
    (0x0008_1155, UI, "Referenced SOP Instance UID"),
    (0x0008_2112, SQ, "Source Image Sequence"),
    (0x0010_0010, PN, "Patient's Name"),
    (0x0010_0020, LO, "Patient ID"),
    (0x0010_0030, DA, "Patient's Birth Date"),
    (0x0010_0040, CS, "Patient's Sex"),
    (0x0010_1010, AS, "Patient's Age"),
    (0x0010_1020, DS, "Patient's Size"),
    (0x0010_1030, DS, "Patient's Weight"),
    (0x0010_4000, LT, "Patient Comments"),
    (0x0018_0015, CS, "Body Part Examined"),
    (0x0018_0020, CS, "Scanning Sequence"),
    (0x0018_0022, CS, "Scan Options"),
    (0x0018_0023, CS, "MR Acquisition Type"),
    (0x0018_0050, DS, "Slice Thickness"),
    (0x0018_0080, DS, "Repetition Time"),
    (0x0018_0081, DS, "Echo Time"),
    (0x0018_0087, DS, "Magnetic Field Strength"),
    (0x0018_1000, LO, "Device Serial Number"),
    (0x0018_1020, LO, "Software Versions"),
    (0x0018_1030, LO, "Protocol Name"),
    (0x0018_5100, CS, "Patient Position"),
    (0x0020_000D, UI, "Study Instance UID"),
    (0x0020_000E, UI, "Series Instance UID"),
    (0x0020_0010, SH, "Study ID"),
    (0x0020_0011, IS, "Series Number"),
    (0x0020_0012, IS, "Acquisition Number"),
    (0x0020_0013, IS, "Instance Number"),
    (0x0020_0032, DS, "Image Position (Patient)"),
    (0x0020_0037, DS, "Image Orientation (Patient)"),
    (0x0020_0052, UI, "Frame of Reference UID"),
    (0x0020_4000, LT, "Image Comments"),
    (0x0028_0002, US, "Samples per Pixel"),
    (0x0028_0004, CS, "Photometric Interpretation"),
    (0x0028_0008, IS, "Number of Frames"),
    (0x0028_0010, US, "Rows"),
    (0x0028_0011, US, "Columns"),
    (0x0028_0030, DS, "Pixel Spacing"),
    (0x0028_0100, US, "Bits Allocated"),
    (0x0028_0101, US, "Bits Stored"),
    (0x0028_0102, US, "High Bit"),
    (0x0028_0103, US, "Pixel Representation"),
    (0x0028_1050, DS, "Window Center"),
    (0x0028_1051, DS, "Window Width"),
    (0x0032_1032, PN, "Requesting Physician"),
    (0x0032_1060, LO, "Requested Procedure Description"),
    (0x0040_0244, DA, "Performed Procedure Step Start Date"),
    (0x0040_0245, TM, "Performed Procedure Step Start Time"),
    (0x0040_0253, SH, "Performed Procedure Step ID"),
    (0x0040_0254, LO, "Performed Procedure Step Description"),
    (0x0040_0275, SQ, "Request Attributes Sequence"),
    (0x5200_9229, SQ, "Shared Functional Groups Sequence"),
    (0x5200_9230, SQ, "Per-frame Functional Groups Sequence"),
    (0x7FE0_0008, OF, "Float Pixel Data"),
    (0x7FE0_0009, OD, "Double Float Pixel Data"),
    (0x7FE0_0010, OW, "Pixel Data"),
];

static STANDARD: StandardDataDictionary = StandardDataDictionary;

pub fn lookup(tag: Tag) -> Option<&'static DictEntry> {
    ENTRIES
        .binary_search_by_key(&tag, |e| e.tag)
        .ok()
        .map(|i| &ENTRIES[i])
}

fn standard(tag: Tag) -> Option<(Vr, &'static str)> {
    let entry = STANDARD.by_tag(DicomTag(group(tag), element(tag)))?;
    // unknown VR codes decode opaquely
    let vr = Vr::from_bytes(entry.vr.relaxed().to_bytes()).unwrap_or(Vr::UN);
    Some((vr, entry.alias))
}

/// Display name, if the tag is known.
pub fn name(tag: Tag) -> Option<Cow<'static, str>> {
    if let Some(entry) = lookup(tag) {
        return Some(Cow::Borrowed(entry.name));
    }
    if element(tag) == 0 {
        return Some(Cow::Borrowed("Group Length"));
    }
    if is_private_creator(tag) {
        return Some(Cow::Borrowed("Private Creator"));
    }
    if group(tag) % 2 == 1 {
        return None;
    }
    standard(tag).map(|(_, alias)| Cow::Owned(spaced(alias)))
}

/// VR used when the transfer syntax does not carry one.
pub fn vr(tag: Tag) -> Vr {
    if let Some(entry) = lookup(tag) {
        return entry.vr;
    }
    if element(tag) == 0 {
        return Vr::UL;
    }
    if is_private_creator(tag) {
        return Vr::LO;
    }
    if group(tag) % 2 == 1 {
        return Vr::UN;
    }
    standard(tag).map_or(Vr::UN, |(vr, _)| vr)
}

/// `AdditionalPatientHistory` -> `Additional Patient History`,
/// `SOPInstanceUID` -> `SOP Instance UID`.
fn spaced(alias: &str) -> String {
    let chars: Vec<char> = alias.chars().collect();
    let mut out = String::with_capacity(alias.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower)
            {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

pub fn is_pixel_data(tag: Tag) -> bool {
    matches!(tag, FLOAT_PIXEL_DATA | DOUBLE_FLOAT_PIXEL_DATA | PIXEL_DATA)
}

fn is_private_creator(tag: Tag) -> bool {
    group(tag) % 2 == 1 && (0x0010..=0x00FF).contains(&element(tag))
}
