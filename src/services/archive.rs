use std::fs::File;
use std::io::{Cursor, ErrorKind};
use std::path::Path;

use anyhow::{Context, Result};
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

/// Bundles the given blobs into a single deflate-compressed zip, built in
/// memory. Entry order follows the input list. A blob deleted between
/// listing and bundling is skipped rather than failing the whole archive.
pub fn bundle_blobs(uploads_dir: &Path, blob_names: &[String]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for name in blob_names {
        let path = uploads_dir.join(name);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Blob {} vanished before archiving, skipping", name);
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to open blob {}", name));
            }
        };

        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start archive entry {}", name))?;
        std::io::copy(&mut file, &mut zip)
            .with_context(|| format!("failed to write archive entry {}", name))?;
    }

    let cursor = zip.finish().context("failed to finalize archive")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;
    use zip::ZipArchive;

    #[test]
    fn test_bundle_contains_all_blobs() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("101.py"), b"print('hi')").unwrap();
        std::fs::write(dir.path().join("102.txt"), b"notes").unwrap();

        let names = vec!["101.py".to_string(), "102.txt".to_string()];
        let bytes = bundle_blobs(dir.path(), &names).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("101.py")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "print('hi')");
    }

    #[test]
    fn test_bundle_of_nothing_is_valid_zip() {
        let dir = tempdir().unwrap();
        let bytes = bundle_blobs(dir.path(), &[]).unwrap();

        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_bundle_skips_vanished_blob() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("101.py"), b"here").unwrap();

        let names = vec!["101.py".to_string(), "gone.py".to_string()];
        let bytes = bundle_blobs(dir.path(), &names).unwrap();

        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);
    }
}
