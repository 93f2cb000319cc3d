//! Raw binary files built from one-byte hex tokens

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use fxpack_fixed_point::HexString;

use crate::create_parent_dir;
use crate::error::{FioError, Result};

/// Headerless byte stream: each two-digit hex token becomes one byte, in order
pub struct BinFile;

impl BinFile {
    /// Write `tokens` to `path`, creating parent directories.
    ///
    /// Every token is validated before the file is created, so a malformed token
    /// never leaves a partial record on disk.
    pub fn save(path: impl AsRef<Path>, tokens: &[HexString]) -> Result<()> {
        let path = path.as_ref();
        let bytes = tokens
            .iter()
            .enumerate()
            .map(|(index, token)| {
                token
                    .to_byte()
                    .map_err(|source| FioError::MalformedToken { index, source })
            })
            .collect::<Result<Vec<u8>>>()?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "Writing binary file");
        create_parent_dir(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Parse raw text tokens, then [`BinFile::save`] them
    pub fn save_str<S: AsRef<str>>(path: impl AsRef<Path>, tokens: &[S]) -> Result<()> {
        let tokens = tokens
            .iter()
            .enumerate()
            .map(|(index, t)| {
                HexString::new(t.as_ref()).map_err(|source| FioError::MalformedToken { index, source })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::save(path, &tokens)
    }

    /// Raw content of `path`; a missing file yields an empty buffer
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Binary file not found, using empty default");
            return Ok(Vec::new());
        }
        tracing::info!(path = %path.display(), "Loading binary file");
        Ok(std::fs::read(path)?)
    }

    /// Content of `path` as one-byte hex tokens
    pub fn load_tokens(path: impl AsRef<Path>) -> Result<Vec<HexString>> {
        Ok(HexString::from_bytes(&Self::load(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/model.bin");

        BinFile::save_str(&path, &["00", "7f", "A5", "ff"]).unwrap();
        assert_eq!(BinFile::load(&path).unwrap(), vec![0x00, 0x7f, 0xa5, 0xff]);

        let tokens = BinFile::load_tokens(&path).unwrap();
        let text: Vec<&str> = tokens.iter().map(HexString::as_str).collect();
        assert_eq!(text, ["00", "7f", "a5", "ff"]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(BinFile::load(dir.path().join("absent.bin")).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_length_token_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.bin");

        let err = BinFile::save_str(&path, &["00", "abc"]).unwrap_err();
        assert!(matches!(err, FioError::MalformedToken { index: 1, .. }));
        assert!(!path.exists());

        let err = BinFile::save_str(&path, &["0"]).unwrap_err();
        assert!(matches!(err, FioError::MalformedToken { index: 0, .. }));
    }

    #[test]
    fn test_foreign_character_rejected() {
        let dir = TempDir::new().unwrap();
        let err = BinFile::save_str(dir.path().join("bad.bin"), &["0x"]).unwrap_err();
        assert!(matches!(err, FioError::MalformedToken { index: 0, .. }));
    }

    #[test]
    fn test_empty_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.bin");
        BinFile::save(&path, &[]).unwrap();
        assert!(path.exists());
        assert!(BinFile::load(&path).unwrap().is_empty());
    }
}
