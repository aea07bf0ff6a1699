//! PDF document discovery and page text extraction.

use crate::types::Page;
use docent_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Loads PDF documents from a directory, one page at a time.
pub struct DocumentLoader;

impl DocumentLoader {
    /// List supported files directly inside `dir`, sorted by file name.
    pub fn discover(dir: &Path) -> AppResult<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(AppError::Load {
                path: dir.to_path_buf(),
                message: "documents directory does not exist".to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| AppError::Load {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            if is_supported(entry.path()) {
                files.push(entry.into_path());
            } else {
                tracing::debug!("Skipping unsupported file: {:?}", entry.path());
            }
        }

        Ok(files)
    }

    /// Lazily yield every page of every supported document in `dir`.
    ///
    /// Files are opened one at a time as the iterator advances. A file that
    /// fails to load yields a single `AppError::Load` and iteration moves on
    /// to the next file.
    pub fn pages(dir: &Path) -> AppResult<PageIter> {
        let files = Self::discover(dir)?;
        Ok(PageIter {
            file_count: files.len(),
            files_loaded: 0,
            files: files.into_iter(),
            current: Vec::new().into_iter(),
            on_file: None,
        })
    }

    /// Load all pages of a single PDF.
    ///
    /// Pages whose text cannot be decoded contribute empty text.
    pub fn load_file(path: &Path) -> AppResult<Vec<Page>> {
        let source_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AppError::Load {
                path: path.to_path_buf(),
                message: "path has no file name".to_string(),
            })?;

        let document = lopdf::Document::load(path).map_err(|e| AppError::Load {
            path: path.to_path_buf(),
            message: format!("failed to parse PDF: {}", e),
        })?;

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        tracing::debug!(file = %source_id, pages = page_numbers.len(), "Extracting PDF text");

        let pages = page_numbers
            .into_iter()
            .map(|number| {
                let text = document.extract_text(&[number]).unwrap_or_else(|e| {
                    tracing::warn!(file = %source_id, page = number, error = %e, "Could not decode page text");
                    String::new()
                });
                Page::new(source_id.clone(), number.saturating_sub(1) as usize, text)
            })
            .collect();

        Ok(pages)
    }
}

type FileCallback = Box<dyn FnMut(usize, &Path, usize) + Send>;

/// Iterator returned by [`DocumentLoader::pages`].
pub struct PageIter {
    file_count: usize,
    files_loaded: usize,
    files: std::vec::IntoIter<PathBuf>,
    current: std::vec::IntoIter<Page>,
    on_file: Option<FileCallback>,
}

impl PageIter {
    /// Number of documents discovered, including ones not yet opened.
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Call `callback(files_loaded, path, page_count)` after each document
    /// is opened successfully.
    pub fn on_file(mut self, callback: impl FnMut(usize, &Path, usize) + Send + 'static) -> Self {
        self.on_file = Some(Box::new(callback));
        self
    }
}

impl Iterator for PageIter {
    type Item = AppResult<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(page) = self.current.next() {
                return Some(Ok(page));
            }

            let path = self.files.next()?;
            match DocumentLoader::load_file(&path) {
                Ok(pages) => {
                    self.files_loaded += 1;
                    if let Some(callback) = self.on_file.as_mut() {
                        callback(self.files_loaded, &path, pages.len());
                    }
                    self.current = pages.into_iter();
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::write_pdf;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.PDF"), b"x").unwrap();
        fs::write(temp.path().join("a.pdf"), b"x").unwrap();
        fs::write(temp.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(temp.path().join("nested.pdf")).unwrap();

        let files = DocumentLoader::discover(temp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.PDF"]);
    }

    #[test]
    fn test_missing_directory_is_load_error() {
        let temp = TempDir::new().unwrap();
        let result = DocumentLoader::discover(&temp.path().join("absent"));
        assert!(matches!(result, Err(AppError::Load { .. })));
    }

    #[test]
    fn test_load_pages_with_zero_based_numbers() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manual.pdf");
        write_pdf(&path, &["Hello first page", "Hello second page"]);

        let pages = DocumentLoader::load_file(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].source_id, "manual.pdf");
        assert_eq!(pages[0].page_number, 0);
        assert_eq!(pages[1].page_number, 1);
        assert!(pages[0].text.contains("first"));
        assert!(pages[1].text.contains("second"));
    }

    #[test]
    fn test_corrupt_pdf_is_load_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.pdf");
        fs::write(&path, b"this is not a pdf").unwrap();

        match DocumentLoader::load_file(&path) {
            Err(AppError::Load { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected load error, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_page_iterator_spans_files_and_reports_failures() {
        let temp = TempDir::new().unwrap();
        write_pdf(&temp.path().join("a.pdf"), &["Hello alpha"]);
        fs::write(temp.path().join("b.pdf"), b"garbage").unwrap();
        write_pdf(&temp.path().join("c.pdf"), &["Hello gamma", "Hello delta"]);

        let results: Vec<_> = DocumentLoader::pages(temp.path()).unwrap().collect();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].as_ref().unwrap().source_id, "a.pdf");
        assert!(matches!(results[1], Err(AppError::Load { .. })));
        assert_eq!(results[3].as_ref().unwrap().page_number, 1);
    }

    #[test]
    fn test_page_iterator_reports_each_opened_file() {
        let temp = TempDir::new().unwrap();
        write_pdf(&temp.path().join("a.pdf"), &["Hello alpha", "Hello beta"]);
        write_pdf(&temp.path().join("b.pdf"), &["Hello gamma"]);

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        let iter = DocumentLoader::pages(temp.path())
            .unwrap()
            .on_file(move |done, path, pages| {
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                sink.lock().unwrap().push((done, name, pages));
            });
        assert_eq!(iter.file_count(), 2);

        let pages: Vec<Page> = iter.collect::<AppResult<_>>().unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, "a.pdf".to_string(), 2), (2, "b.pdf".to_string(), 1)]
        );
    }
}
