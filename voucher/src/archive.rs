//! Voucher batch archives
//!
//! A ZIP holding `manifest.csv` plus one `<address>.png` QR image of each
//! voucher's secret. The manifest holds plaintext private keys: it is meant
//! for the operator only.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::builder::Voucher;
use crate::error::{Result, VoucherError};

pub const MANIFEST_NAME: &str = "manifest.csv";

/// Manifest column order
pub const MANIFEST_HEADER: [&str; 5] = [
    "address",
    "privateKey",
    "encryptedPrivateKey",
    "encryptionKey",
    "link",
];

/// One manifest line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct ManifestRow {
    pub address: String,
    #[serde(rename = "privateKey")]
    pub private_key: String,
    #[serde(rename = "encryptedPrivateKey")]
    pub encrypted_private_key: String,
    /// The voucher secret
    #[serde(rename = "encryptionKey")]
    pub encryption_key: String,
    pub link: String,
}

impl From<&Voucher> for ManifestRow {
    fn from(voucher: &Voucher) -> Self {
        Self {
            address: voucher.address.to_checksum(),
            private_key: voucher.private_key_hex().to_string(),
            encrypted_private_key: voucher.encrypted_key.to_hex(),
            encryption_key: voucher.secret().as_str().to_string(),
            link: voucher.link.clone(),
        }
    }
}

/// Image file name for a voucher
pub fn image_name(address: &str) -> String {
    format!("{}.png", address)
}

/// Serialize manifest rows as CSV, header first
pub fn manifest_csv(vouchers: &[Voucher]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for voucher in vouchers {
        writer
            .serialize(ManifestRow::from(voucher))
            .map_err(|e| VoucherError::Serialization(format!("manifest row: {}", e)))?;
    }
    writer
        .into_inner()
        .map_err(|e| VoucherError::Serialization(format!("manifest flush: {}", e)))
}

pub fn parse_manifest(bytes: &[u8]) -> Result<Vec<ManifestRow>> {
    let mut reader = csv::Reader::from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| VoucherError::Serialization(format!("manifest header: {}", e)))?;
    if headers.iter().ne(MANIFEST_HEADER.iter().copied()) {
        return Err(VoucherError::Serialization(format!(
            "unexpected manifest header: {:?}",
            headers
        )));
    }

    reader
        .deserialize()
        .map(|row| row.map_err(|e| VoucherError::Serialization(format!("manifest row: {}", e))))
        .collect()
}

/// Write the archive into any seekable sink
pub fn write_archive_to<W: Write + Seek>(vouchers: &[Voucher], sink: W) -> Result<W> {
    let mut zip = ZipWriter::new(sink);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    // PNG data is already compressed
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    zip.start_file(MANIFEST_NAME, deflated).map_err(archive_err)?;
    let mut manifest = manifest_csv(vouchers)?;
    let written = zip.write_all(&manifest);
    manifest.zeroize();
    written?;

    for voucher in vouchers {
        zip.start_file(image_name(&voucher.address.to_checksum()), stored)
            .map_err(archive_err)?;
        zip.write_all(&voucher.qr_png)?;
    }

    zip.finish().map_err(archive_err)
}

/// Build the archive in memory
pub fn write_archive(vouchers: &[Voucher]) -> Result<Vec<u8>> {
    let cursor = write_archive_to(vouchers, Cursor::new(Vec::new()))?;
    Ok(cursor.into_inner())
}

/// Contents of a voucher archive
#[derive(Debug)]
pub struct VoucherArchive {
    pub manifest: Vec<ManifestRow>,
    /// Image file name → PNG bytes
    pub images: BTreeMap<String, Vec<u8>>,
}

pub fn read_archive(bytes: &[u8]) -> Result<VoucherArchive> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;

    let mut manifest_bytes = Vec::new();
    zip.by_name(MANIFEST_NAME)
        .map_err(archive_err)?
        .read_to_end(&mut manifest_bytes)?;
    let manifest = parse_manifest(&manifest_bytes)?;
    manifest_bytes.zeroize();

    let mut images = BTreeMap::new();
    for index in 0..zip.len() {
        let mut file = zip.by_index(index).map_err(archive_err)?;
        let name = file.name().to_string();
        if name == MANIFEST_NAME {
            continue;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        images.insert(name, data);
    }

    Ok(VoucherArchive { manifest, images })
}

fn archive_err(e: zip::result::ZipError) -> VoucherError {
    VoucherError::Archive(e.to_string())
}
