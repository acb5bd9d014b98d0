use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

/// Raw dataset bytes, mapped or buffered depending on size
pub enum FileContent {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl AsRef<[u8]> for FileContent {
    fn as_ref(&self) -> &[u8] {
        match self {
            FileContent::Mapped(mmap) => mmap,
            FileContent::Buffered(bytes) => bytes.as_slice(),
        }
    }
}

impl FileContent {
    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, FileContent::Mapped(_))
    }
}

/// Read a file, memory-mapping it when it is larger than 1 MiB.
///
/// UTF-8 validation is left to the consumer (the CSV reader checks each
/// record) so large datasets are never copied just to be checked.
pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: the mapping is read-only and dropped before the loader returns
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let content =
            std::fs::read(path).with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn small_files_are_buffered() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "text,label_topic\nno water,Water\n").unwrap();

        let content = read_file_smart(tmp.path()).unwrap();
        assert!(!content.is_mapped());
        assert!(content.as_ref().starts_with(b"text,label_topic"));
    }

    #[test]
    fn large_files_are_mapped() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let row = "reddit,garbage piling up near the bus stop again\n";
        while tmp.as_file().metadata().unwrap().len() <= MMAP_THRESHOLD {
            tmp.write_all(row.as_bytes()).unwrap();
        }
        tmp.flush().unwrap();

        let content = read_file_smart(tmp.path()).unwrap();
        assert!(content.is_mapped());
        assert_eq!(content.len() as u64, tmp.as_file().metadata().unwrap().len());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_file_smart("/definitely/not/here.csv")
            .err()
            .expect("missing file must fail");
        assert!(err.to_string().contains("Failed to read metadata"));
    }
}
