//! Read-only view sources.
//!
//! A view source is a hierarchical key->text store with `/`-separated paths
//! and a single-star glob. The renderer only ever asks for three selectors:
//! `components/*.html`, `pages/*.html` and the top-level `*.html`.
//!
//! Two implementations ship with the crate: [`MemorySource`] (tests, embedded
//! view sets, hot-reload experiments) and [`DirSource`] (a directory on
//! disk).

use std::collections::BTreeMap;
use std::path::PathBuf;

use parking_lot::RwLock;
use thiserror::Error;

/// Errors from reading a view source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("view file `{0}` not found")]
    NotFound(String),

    #[error("could not read view file `{0}`")]
    Io(String, #[source] std::io::Error),
}

/// A glob-capable, read-only key->text store of template sources.
///
/// Paths are `/`-separated. Patterns contain at most one `*`, which matches
/// any run of characters except `/`. Implementations must return `glob`
/// results in a stable order so view-set builds are deterministic.
pub trait ViewSource: Send + Sync {
    /// Paths matching `pattern`, sorted.
    fn glob(&self, pattern: &str) -> Result<Vec<String>, SourceError>;

    /// The text stored under `path`.
    fn read(&self, path: &str) -> Result<String, SourceError>;
}

/// Match a single-star pattern against a path. `*` does not cross `/`.
pub(crate) fn glob_match(pattern: &str, path: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == path,
        Some((prefix, suffix)) => {
            let Some(middle) = path
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(suffix))
            else {
                return false;
            };
            !middle.contains('/')
        }
    }
}

/// An in-memory view source.
///
/// Interior-mutable so tests (and hot-reload callers) can change file
/// contents while a renderer retains the source for reloads.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RwLock<BTreeMap<String, String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<String>, text: impl Into<String>) {
        self.files.write().insert(path.into(), text.into());
    }

    /// Remove a file. Returns `true` if it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }
}

impl<P: Into<String>, T: Into<String>> FromIterator<(P, T)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (P, T)>>(iter: I) -> Self {
        let source = Self::new();
        for (path, text) in iter {
            source.insert(path, text);
        }
        source
    }
}

impl ViewSource for MemorySource {
    fn glob(&self, pattern: &str) -> Result<Vec<String>, SourceError> {
        // BTreeMap iteration order keeps results sorted.
        Ok(self
            .files
            .read()
            .keys()
            .filter(|path| glob_match(pattern, path))
            .cloned()
            .collect())
    }

    fn read(&self, path: &str) -> Result<String, SourceError> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(path.to_owned()))
    }
}

/// A view source backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ViewSource for DirSource {
    fn glob(&self, pattern: &str) -> Result<Vec<String>, SourceError> {
        // The pattern's directory part is literal; only the file part globs.
        let (dir, _) = pattern.rsplit_once('/').unwrap_or(("", pattern));
        let dir_path = self.root.join(dir);

        let entries = match std::fs::read_dir(&dir_path) {
            Ok(entries) => entries,
            // A missing subdirectory just means no matches.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(SourceError::Io(dir_path.display().to_string(), err)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|err| SourceError::Io(dir_path.display().to_string(), err))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = if dir.is_empty() {
                name
            } else {
                format!("{dir}/{name}")
            };
            if glob_match(pattern, &path) {
                paths.push(path);
            }
        }

        paths.sort_unstable();
        Ok(paths)
    }

    fn read(&self, path: &str) -> Result<String, SourceError> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound(path.to_owned())
            } else {
                SourceError::Io(path.to_owned(), err)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_glob_match_top_level() {
        assert!(glob_match("*.html", "index.html"));
        assert!(glob_match("*.html", "default.base.html"));
        assert!(!glob_match("*.html", "pages/index.html"));
        assert!(!glob_match("*.html", "style.css"));
    }

    #[test]
    fn test_glob_match_prefixed() {
        assert!(glob_match("pages/*.html", "pages/index.html"));
        assert!(!glob_match("pages/*.html", "pages/sub/index.html"));
        assert!(!glob_match("pages/*.html", "components/index.html"));
    }

    #[test]
    fn test_glob_match_literal() {
        assert!(glob_match("pages/index.html", "pages/index.html"));
        assert!(!glob_match("pages/index.html", "pages/other.html"));
    }

    #[test]
    fn test_memory_source_glob_is_sorted() {
        let source: MemorySource = [
            ("pages/b.html", "b"),
            ("pages/a.html", "a"),
            ("base.html", "base"),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            source.glob("pages/*.html").unwrap(),
            vec!["pages/a.html", "pages/b.html"]
        );
        assert_eq!(source.glob("*.html").unwrap(), vec!["base.html"]);
    }

    #[test]
    fn test_memory_source_read() {
        let source: MemorySource = [("pages/a.html", "content a")].into_iter().collect();

        assert_eq!(source.read("pages/a.html").unwrap(), "content a");
        assert!(matches!(
            source.read("pages/missing.html"),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn test_memory_source_mutation() {
        let source = MemorySource::new();
        source.insert("a.html", "v1");
        assert_eq!(source.read("a.html").unwrap(), "v1");

        source.insert("a.html", "v2");
        assert_eq!(source.read("a.html").unwrap(), "v2");

        assert!(source.remove("a.html"));
        assert!(source.read("a.html").is_err());
    }

    #[test]
    fn test_dir_source() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("pages")).unwrap();
        std::fs::write(dir.path().join("default.base.html"), "base").unwrap();
        std::fs::write(dir.path().join("pages/p0.html"), "p0").unwrap();
        std::fs::write(dir.path().join("pages/p1.html"), "p1").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let source = DirSource::new(dir.path());

        assert_eq!(source.glob("*.html").unwrap(), vec!["default.base.html"]);
        assert_eq!(
            source.glob("pages/*.html").unwrap(),
            vec!["pages/p0.html", "pages/p1.html"]
        );
        assert!(source.glob("components/*.html").unwrap().is_empty());
        assert_eq!(source.read("pages/p0.html").unwrap(), "p0");
        assert!(matches!(
            source.read("pages/nope.html"),
            Err(SourceError::NotFound(_))
        ));
    }
}
