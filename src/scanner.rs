use crate::error::Result;
use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Directories never worth indexing: dependencies, caches and build output.
const SKIPPED_DIRS: &[&str] = &["vendor", "node_modules", "storage", "target", "bootstrap"];

const SOURCE_EXTENSION: &str = "php";

/// File scanner for traversing an application's source tree.
///
/// The `FileScanner` recursively walks a directory to find source files with one of the
/// configured extensions. Hidden directories and dependency/cache directories
/// (`vendor`, `node_modules`, `storage`, ...) are skipped.
///
/// # Example
///
/// ```no_run
/// use route2postman::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./app"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} source files", result.source_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Paths of all discovered source files, in walk order
    pub source_files: Vec<PathBuf>,
    /// Warning messages for inaccessible entries
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a scanner for `.php` files under `root_path`.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects matching files.
    ///
    /// Entries that cannot be accessed are logged and reported as warnings; scanning
    /// continues past them.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut source_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                let is_hidden = file_name.starts_with('.');
                let is_skipped = e.file_type().is_dir() && SKIPPED_DIRS.contains(&file_name.as_ref());

                !is_hidden && !is_skipped
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    let matches = path
                        .extension()
                        .and_then(|s| s.to_str())
                        .map(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
                        .unwrap_or(false);

                    if path.is_file() && matches {
                        source_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult {
            source_files,
            warnings,
        })
    }
}
