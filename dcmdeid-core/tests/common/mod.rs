#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use dcmdeid_core::dicom::dict::{PATIENT_ID, PATIENT_NAME, PIXEL_DATA, SERIES_NUMBER, STUDY_DATE};
use dcmdeid_core::dicom::read::{ReadOptions, read_file_bytes};
use dcmdeid_core::dicom::record::{
    DicomFile, EXPLICIT_VR_LITTLE_ENDIAN, Element, IMPLICIT_VR_LITTLE_ENDIAN, Record,
};
use dcmdeid_core::dicom::vr::Vr;
use dcmdeid_core::dicom::write::to_bytes;
use dcmdeid_core::{FieldAddress, walk};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

pub const REFERENCED_IMAGES: u32 = 0x0008_1140;
pub const REFERENCED_INSTANCE: u32 = 0x0008_1155;
pub const IMAGE_COMMENTS: u32 = 0x0020_4000;
pub const SECONDARY_CAPTURE_DATE: u32 = 0x0018_1012;
pub const PATIENT_HISTORY: u32 = 0x0010_21B0;

/// A small record with a name, a two-item sequence and pixel data.
pub fn record(patient: &str, instance: &str) -> DicomFile {
    record_in(EXPLICIT_VR_LITTLE_ENDIAN, patient, instance)
}

fn record_in(syntax: &str, patient: &str, instance: &str) -> DicomFile {
    let mut file = DicomFile::new(syntax, "1.2.840.10008.5.1.4.1.1.2", instance)
        .expect("little endian syntaxes are supported");
    file.dataset.put_text(PATIENT_NAME, Vr::PN, &format!("{patient}^Test"));
    file.dataset.put_text(PATIENT_ID, Vr::LO, patient);
    file.dataset.put_text(SERIES_NUMBER, Vr::IS, "3");
    let items = ["1.9.1", "1.9.2"]
        .iter()
        .map(|uid| {
            let mut item = Record::new();
            item.put_text(REFERENCED_INSTANCE, Vr::UI, uid);
            item
        })
        .collect();
    file.dataset.insert(REFERENCED_IMAGES, Element::sequence(items));
    file.dataset
        .insert(PIXEL_DATA, Element::bytes(Vr::OW, vec![7u8; 16]));
    file
}

pub fn dated_record(patient: &str, instance: &str, date: &str) -> DicomFile {
    let mut file = record(patient, instance);
    file.dataset.put_text(STUDY_DATE, Vr::DA, date);
    file.dataset
        .put_text(IMAGE_COMMENTS, Vr::LT, &format!("scan on {date} at noon"));
    file
}

/// Implicit VR record carrying the study date in attributes beyond the
/// everyday ones, so their VRs come only from the dictionary on read.
pub fn implicit_record(patient: &str, instance: &str, date: &str) -> DicomFile {
    let mut file = record_in(IMPLICIT_VR_LITTLE_ENDIAN, patient, instance);
    file.dataset.put_text(STUDY_DATE, Vr::DA, date);
    file.dataset.put_text(SECONDARY_CAPTURE_DATE, Vr::DA, date);
    file.dataset
        .put_text(PATIENT_HISTORY, Vr::LT, &format!("seen on {date}"));
    file
}

pub fn encode(file: &DicomFile) -> Vec<u8> {
    to_bytes(file).expect("fixture serializes")
}

pub fn decode(bytes: &[u8]) -> DicomFile {
    read_file_bytes(bytes, ReadOptions::full()).expect("output parses")
}

pub fn write(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}

pub fn write_zip(path: &Path, members: &[(&str, Vec<u8>)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    for (name, bytes) in members {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

pub fn tar_bytes(members: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, bytes) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, bytes.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}

/// Members of an uncompressed tar stream in archive order.
pub fn read_tar(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(bytes);
    let mut out = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let mut data = Vec::new();
        std::io::copy(&mut entry, &mut data).unwrap();
        out.push((name, data));
    }
    out
}

/// Whether `needle` occurs anywhere in `haystack`.
pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Members of a zip file in archive order.
pub fn read_zip(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut out = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).unwrap();
        let mut bytes = Vec::new();
        std::io::copy(&mut entry, &mut bytes).unwrap();
        out.push((entry.name().to_string(), bytes));
    }
    out
}

/// Relative paths of every file under `root`, sorted.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    out.sort();
    out
}

/// Leaf fields of the main dataset.
pub fn dataset_leaves(file: &DicomFile) -> usize {
    let mut n = 0;
    walk(&file.dataset, &mut |_: &FieldAddress, _: &str, _: &Element| n += 1);
    n
}

/// Rule text deleting every leaf address found in the main dataset.
pub fn delete_all_rules(file: &DicomFile) -> String {
    let mut addresses = Vec::new();
    walk(&file.dataset, &mut |address: &FieldAddress, _: &str, _: &Element| {
        addresses.push(format!("{address} > delete"));
    });
    addresses.dedup();
    addresses.join("\n")
}
