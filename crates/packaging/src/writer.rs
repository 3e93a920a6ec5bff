//! Package writers
//!
//! A [`PackageWriter`] receives entries in order and produces one container
//! file. Directory entries are always written explicitly, so empty
//! directories survive a round trip.

use crate::format::{PackageFormat, PackageOptions};
use crate::{PackageError, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};
use time::OffsetDateTime;
use zip::write::FileOptions;
use zip::CompressionMethod;

const ZSTD_LEVEL: i32 = 3;

/// Sink for package entries.
pub trait PackageWriter {
    /// Add a directory entry named `name`, taking metadata from `source`.
    fn add_directory(&mut self, name: &str, source: &Path) -> Result<()>;

    /// Add a file entry named `name` with the content of `source`.
    fn add_file(&mut self, name: &str, source: &Path) -> Result<()>;

    /// Add a file entry named `name` with content `data`.
    fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// Flush and close the container.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Writer for `options`, creating the container at `path`.
pub fn create_writer(path: &Path, options: &PackageOptions) -> Result<Box<dyn PackageWriter>> {
    let file = File::create(path)?;
    match options.format {
        PackageFormat::Tar => Ok(Box::new(TarPackageWriter::new(file, options.compress)?)),
        PackageFormat::Zip => Ok(Box::new(ZipPackageWriter::new(file, options.compress))),
    }
}

// ============================================================================
// Tar
// ============================================================================

enum TarSink {
    Plain(BufWriter<File>),
    Zstd(zstd::Encoder<'static, BufWriter<File>>),
}

impl Write for TarSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TarSink::Plain(w) => w.write(buf),
            TarSink::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TarSink::Plain(w) => w.flush(),
            TarSink::Zstd(w) => w.flush(),
        }
    }
}

/// Tar container, optionally zstd-compressed as a whole.
pub struct TarPackageWriter {
    builder: tar::Builder<TarSink>,
}

impl TarPackageWriter {
    /// Tar writer over `file`.
    pub fn new(file: File, compress: bool) -> Result<Self> {
        let writer = BufWriter::new(file);
        let sink = if compress {
            TarSink::Zstd(
                zstd::Encoder::new(writer, ZSTD_LEVEL)
                    .map_err(|e| PackageError::Compression(format!("zstd encode: {}", e)))?,
            )
        } else {
            TarSink::Plain(writer)
        };
        let mut builder = tar::Builder::new(sink);
        builder.follow_symlinks(false);
        Ok(TarPackageWriter { builder })
    }
}

impl PackageWriter for TarPackageWriter {
    fn add_directory(&mut self, name: &str, source: &Path) -> Result<()> {
        self.builder.append_dir(name, source)?;
        Ok(())
    }

    fn add_file(&mut self, name: &str, source: &Path) -> Result<()> {
        self.builder.append_path_with_name(source, name)?;
        Ok(())
    }

    fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(unix_seconds(SystemTime::now()));
        header.set_entry_type(tar::EntryType::Regular);
        self.builder.append_data(&mut header, name, data)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let sink = self.builder.into_inner()?;
        let mut writer = match sink {
            TarSink::Plain(w) => w,
            TarSink::Zstd(encoder) => encoder
                .finish()
                .map_err(|e| PackageError::Compression(format!("zstd finish: {}", e)))?,
        };
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ============================================================================
// Zip
// ============================================================================

/// Zip container with stored or deflated entries.
pub struct ZipPackageWriter {
    zip: zip::ZipWriter<BufWriter<File>>,
    method: CompressionMethod,
}

impl ZipPackageWriter {
    /// Zip writer over `file`.
    pub fn new(file: File, compress: bool) -> Self {
        ZipPackageWriter {
            zip: zip::ZipWriter::new(BufWriter::new(file)),
            method: if compress {
                CompressionMethod::Deflated
            } else {
                CompressionMethod::Stored
            },
        }
    }

    fn options(&self, modified: SystemTime, mode: u32) -> FileOptions {
        FileOptions::default()
            .compression_method(self.method)
            .last_modified_time(zip_time(modified))
            .unix_permissions(mode)
            .large_file(true)
    }

    /// Start an entry carrying the extended timestamp of `modified`.
    fn start_entry(
        &mut self,
        name: &str,
        options: FileOptions,
        modified: SystemTime,
    ) -> Result<()> {
        self.zip.start_file_with_extra_data(name, options)?;
        self.zip.write_all(&extended_timestamp(modified))?;
        self.zip.end_extra_data()?;
        Ok(())
    }
}

impl PackageWriter for ZipPackageWriter {
    fn add_directory(&mut self, name: &str, source: &Path) -> Result<()> {
        let modified = std::fs::metadata(source)?.modified()?;
        let options = self
            .options(modified, 0o755)
            .compression_method(CompressionMethod::Stored);
        let name = if name.ends_with('/') {
            name.to_string()
        } else {
            format!("{}/", name)
        };
        self.start_entry(&name, options, modified)
    }

    fn add_file(&mut self, name: &str, source: &Path) -> Result<()> {
        let modified = std::fs::metadata(source)?.modified()?;
        let options = self.options(modified, 0o644);
        self.start_entry(name, options, modified)?;
        let mut input = File::open(source)?;
        io::copy(&mut input, &mut self.zip)?;
        Ok(())
    }

    fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let modified = SystemTime::now();
        let options = self.options(modified, 0o644);
        self.start_entry(name, options, modified)?;
        self.zip.write_all(data)?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        let mut writer = self.zip.finish()?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Header id of the zip extended timestamp extra field.
const EXTENDED_TIMESTAMP: u16 = 0x5455;

/// Extended timestamp extra field holding the modification time of
/// `modified` in whole Unix seconds.
pub fn extended_timestamp(modified: SystemTime) -> [u8; 9] {
    let seconds = i32::try_from(unix_seconds(modified)).unwrap_or(i32::MAX);
    let mut field = [0u8; 9];
    field[..2].copy_from_slice(&EXTENDED_TIMESTAMP.to_le_bytes());
    field[2..4].copy_from_slice(&5u16.to_le_bytes());
    field[4] = 0x01;
    field[5..].copy_from_slice(&seconds.to_le_bytes());
    field
}

/// Modification time from the extended timestamp field in `extra`, if any.
pub fn modified_from_extra(extra: &[u8]) -> Option<SystemTime> {
    let mut rest = extra;
    while rest.len() >= 4 {
        let id = u16::from_le_bytes([rest[0], rest[1]]);
        let size = usize::from(u16::from_le_bytes([rest[2], rest[3]]));
        let data = rest.get(4..4 + size)?;
        if id == EXTENDED_TIMESTAMP && data.len() >= 5 && data[0] & 0x01 != 0 {
            let seconds = i32::from_le_bytes([data[1], data[2], data[3], data[4]]);
            let seconds = u64::try_from(seconds).ok()?;
            return Some(SystemTime::UNIX_EPOCH + Duration::from_secs(seconds));
        }
        rest = &rest[4 + size..];
    }
    None
}

/// Zip timestamp (UTC, two-second resolution) of `modified`.
pub fn zip_time(modified: SystemTime) -> zip::DateTime {
    let utc = OffsetDateTime::from(modified);
    zip::DateTime::from_date_and_time(
        u16::try_from(utc.year()).unwrap_or(1980),
        u8::from(utc.month()),
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second(),
    )
    .unwrap_or_default()
}

/// Modification time stored in a zip timestamp.
pub fn system_time_of(stamp: zip::DateTime) -> Option<SystemTime> {
    let month = time::Month::try_from(stamp.month()).ok()?;
    let date = time::Date::from_calendar_date(i32::from(stamp.year()), month, stamp.day()).ok()?;
    let datetime = date
        .with_hms(stamp.hour(), stamp.minute(), stamp.second())
        .ok()?
        .assume_utc();
    Some(SystemTime::from(datetime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zip_time_round_trip_within_two_seconds() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_001);
        let back = system_time_of(zip_time(now)).unwrap();
        let drift = now.duration_since(back).unwrap();
        assert!(drift <= Duration::from_secs(2));
    }

    #[test]
    fn test_extended_timestamp_keeps_odd_seconds() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_001);
        let field = extended_timestamp(modified);
        assert_eq!(&field[..4], &[0x55, 0x54, 5, 0]);
        assert_eq!(modified_from_extra(&field), Some(modified));
    }

    #[test]
    fn test_extended_timestamp_found_after_other_fields() {
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_001);
        let mut extra = vec![0x01, 0x00, 0x08, 0x00];
        extra.extend_from_slice(&42u64.to_le_bytes());
        extra.extend_from_slice(&extended_timestamp(modified));
        assert_eq!(modified_from_extra(&extra), Some(modified));
        assert_eq!(modified_from_extra(&extra[..12]), None);
        assert_eq!(modified_from_extra(&[0x55, 0x54, 9]), None);
    }

    #[test]
    fn test_zip_time_out_of_range_falls_back() {
        let ancient = SystemTime::UNIX_EPOCH;
        let dt = zip_time(ancient);
        assert_eq!(dt.year(), 1980);
    }
}
