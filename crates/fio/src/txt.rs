//! Line-oriented UTF-8 text files, one token or string per line

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::create_parent_dir;
use crate::error::Result;

pub struct TxtFile;

impl TxtFile {
    /// Write each entry on its own line
    pub fn save<S: AsRef<str>>(path: impl AsRef<Path>, lines: &[S]) -> Result<()> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), lines = lines.len(), "Writing text file");
        create_parent_dir(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        for line in lines {
            writeln!(writer, "{}", line.as_ref())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Lines of `path` without terminators; a missing file yields no lines
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Text file not found, using empty default");
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(content.lines().map(str::to_string).collect())
    }
}
