//! Plain-text corpus loading from a directory tree.
//!
//! Richer formats (PDF, DOCX, OCR) are extracted elsewhere and arrive here as
//! `.txt`/`.md` files. Document ids are paths relative to the corpus root, so
//! they stay stable across machines.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::CorpusSource;
use crate::types::RawDocument;

pub const DEFAULT_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Debug, Clone)]
pub struct DataProcessor {
    extensions: Vec<String>,
}

impl Default for DataProcessor {
    fn default() -> Self {
        Self { extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect() }
    }
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions.into_iter().map(|e| e.as_ref().trim_start_matches('.').to_lowercase()).collect();
        Self { extensions }
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<RawDocument>> {
        self.process_directory_with(data_dir, None, |_, _, _| {})
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<RawDocument>> {
        self.process_directory_with(data_dir, Some(limit), |_, _, _| {})
    }

    /// Read every matching file under `data_dir` in sorted path order.
    /// `on_file(index, total, path)` is invoked before each file is read.
    pub fn process_directory_with<F>(&self, data_dir: &Path, limit: Option<usize>, mut on_file: F) -> Result<Vec<RawDocument>>
    where
        F: FnMut(usize, usize, &Path),
    {
        if !data_dir.is_dir() {
            return Err(Error::NotFound(format!("corpus directory {}", data_dir.display())));
        }
        let mut files = self.list_files(data_dir);
        if files.is_empty() {
            warn!(dir = %data_dir.display(), "no corpus files found");
            return Ok(vec![]);
        }
        if let Some(limit) = limit {
            if files.len() > limit {
                files.truncate(limit);
                info!(limit, "limited corpus to first files");
            }
        }
        let total = files.len();
        let mut documents = Vec::with_capacity(total);
        for (index, file_path) in files.iter().enumerate() {
            on_file(index, total, file_path);
            debug!(file = %file_path.display(), "reading corpus file");
            let text = self.read_file_content(file_path)?;
            documents.push(RawDocument { id: self.extract_doc_id(file_path, data_dir), text });
        }
        info!(documents = documents.len(), dir = %data_dir.display(), "loaded corpus");
        Ok(documents)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn extract_doc_id(&self, file_path: &Path, data_dir: &Path) -> String {
        let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
    }

    fn list_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.matches_extension(p))
            .collect();
        files.sort();
        files
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// A [`CorpusSource`] backed by a directory of text files.
#[derive(Debug, Clone)]
pub struct DirectoryCorpus {
    root: PathBuf,
    limit: Option<usize>,
    processor: DataProcessor,
}

impl DirectoryCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), limit: None, processor: DataProcessor::new() }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_processor(mut self, processor: DataProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn root(&self) -> &Path { &self.root }
}

impl CorpusSource for DirectoryCorpus {
    fn load_corpus(&self) -> Result<Vec<RawDocument>> {
        self.processor.process_directory_with(&self.root, self.limit, |_, _, _| {})
    }
}
