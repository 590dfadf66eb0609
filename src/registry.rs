//! Index registry: one [`DocumentIndex`] per supported file under a root.
//!
//! # Discovery
//!
//! 1. Walk the root recursively, keeping files whose extension (any case)
//!    is one of the configured formats and that match no exclude glob.
//! 2. For every file, load segments and build its index. Documents are
//!    built concurrently (bounded by `indexing.max_parallel_documents`); a
//!    document that fails to load is skipped with a warning.
//! 3. No supported file at all, or none that could be indexed →
//!    [`RegistryError::NoDocuments`].
//! 4. Entries are keyed by canonical path and iterated in sorted key order,
//!    independent of build completion order.
//!
//! The resulting [`Registry`] is an immutable snapshot. [`RegistryCache`]
//! hands out the same `Arc<Registry>` for repeated requests on one root.
//! Files changed on disk after discovery are not picked up.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{LoadError, RegistryError};
use crate::extract::DocumentFormat;
use crate::index::DocumentIndex;
use crate::loader;
use crate::models::Document;

/// Always excluded, on top of configured patterns.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**"];

/// Knobs for a discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    pub formats: Vec<DocumentFormat>,
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
    pub max_chars: usize,
    pub max_parallel_documents: usize,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DiscoverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            formats: config.corpus.formats(),
            exclude_globs: config.corpus.exclude_globs.clone(),
            follow_symlinks: config.corpus.follow_symlinks,
            max_chars: config.chunking.max_chars,
            max_parallel_documents: config.indexing.max_parallel_documents,
        }
    }
}

/// A supported file that could not be indexed.
#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

/// Immutable, sorted collection of per-document indexes.
#[derive(Debug)]
pub struct Registry {
    root: PathBuf,
    indexes: BTreeMap<String, DocumentIndex>,
    skipped: Vec<SkippedDocument>,
}

enum BuildOutcome {
    Indexed(DocumentIndex),
    Skipped(SkippedDocument),
}

impl Registry {
    /// Discover and index every supported document under `root`.
    pub async fn discover(
        root: &Path,
        options: &DiscoverOptions,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, RegistryError> {
        let files = scan_corpus(root, options)?;
        if files.is_empty() {
            return Err(RegistryError::NoDocuments {
                root: root.to_path_buf(),
                failed: 0,
            });
        }
        tracing::info!(root = %root.display(), files = files.len(), "indexing corpus");

        let semaphore = Arc::new(Semaphore::new(options.max_parallel_documents.max(1)));
        let mut tasks = JoinSet::new();
        let mut task_paths: HashMap<tokio::task::Id, PathBuf> = HashMap::new();
        for path in files {
            let semaphore = semaphore.clone();
            let embedder = embedder.clone();
            let max_chars = options.max_chars;
            let task_path = path.clone();
            let handle = tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return BuildOutcome::Skipped(SkippedDocument {
                        path,
                        reason: "indexing was shut down".to_string(),
                    });
                };
                build_document(path, max_chars, embedder).await
            });
            task_paths.insert(handle.id(), task_path);
        }

        let mut indexes = BTreeMap::new();
        let mut skipped = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(BuildOutcome::Indexed(index)) => {
                    let key = index.document().key();
                    if indexes.contains_key(&key) {
                        tracing::debug!(document = %key, "duplicate path after canonicalization");
                        continue;
                    }
                    indexes.insert(key, index);
                }
                Ok(BuildOutcome::Skipped(doc)) => {
                    tracing::warn!(path = %doc.path.display(), reason = %doc.reason, "skipping document");
                    skipped.push(doc);
                }
                Err(e) => {
                    let Some(path) = task_paths.remove(&e.id()) else {
                        tracing::warn!(error = %e, "indexing task failed");
                        continue;
                    };
                    let doc = SkippedDocument {
                        path,
                        reason: format!("indexing crashed: {}", e),
                    };
                    tracing::warn!(path = %doc.path.display(), reason = %doc.reason, "skipping document");
                    skipped.push(doc);
                }
            }
        }
        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        let segments: usize = indexes.values().map(DocumentIndex::len).sum();
        tracing::info!(
            root = %root.display(),
            indexed = indexes.len(),
            skipped = skipped.len(),
            segments,
            "corpus indexed"
        );

        if indexes.is_empty() {
            return Err(RegistryError::NoDocuments {
                root: root.to_path_buf(),
                failed: skipped.len(),
            });
        }

        Ok(Self {
            root: root.to_path_buf(),
            indexes,
            skipped,
        })
    }

    /// The directory this registry was discovered from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Canonical-path keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    /// Indexed documents in key order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.indexes.values().map(DocumentIndex::document)
    }

    /// `(key, index)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentIndex)> {
        self.indexes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look an index up by path. Non-canonical paths are canonicalized first.
    pub fn get(&self, path: &Path) -> Option<&DocumentIndex> {
        if let Some(index) = self.indexes.get(path.to_string_lossy().as_ref()) {
            return Some(index);
        }
        let canonical = path.canonicalize().ok()?;
        self.indexes.get(canonical.to_string_lossy().as_ref())
    }

    /// Resolve a user selection: a path, or a display name (first match in key order).
    pub fn find(&self, selector: &str) -> Option<&DocumentIndex> {
        self.get(Path::new(selector)).or_else(|| {
            self.indexes
                .values()
                .find(|index| index.document().display_name == selector)
        })
    }

    /// Supported files that could not be indexed, sorted by path.
    pub fn skipped(&self) -> &[SkippedDocument] {
        &self.skipped
    }
}

async fn build_document(
    path: PathBuf,
    max_chars: usize,
    embedder: Arc<dyn Embedder>,
) -> BuildOutcome {
    let load_path = path.clone();
    let loaded = tokio::task::spawn_blocking(move || -> Result<_, LoadError> {
        let document = Document::from_path(&load_path)
            .map_err(|source| LoadError::Io {
                path: load_path.clone(),
                source,
            })?;
        match document {
            Some(document) => {
                let segments = loader::load(&document.path, max_chars)?;
                Ok(Some((document, segments)))
            }
            None => Ok(None),
        }
    })
    .await;

    match loaded {
        Ok(Ok(Some((document, segments)))) => {
            BuildOutcome::Indexed(DocumentIndex::build(document, segments, embedder).await)
        }
        Ok(Ok(None)) => BuildOutcome::Skipped(SkippedDocument {
            path,
            reason: "unsupported format".to_string(),
        }),
        Ok(Err(e)) => BuildOutcome::Skipped(SkippedDocument {
            path,
            reason: e.to_string(),
        }),
        Err(e) => BuildOutcome::Skipped(SkippedDocument {
            path,
            reason: format!("parser crashed: {}", e),
        }),
    }
}

/// List supported files under `root`, sorted by path.
pub fn scan_corpus(root: &Path, options: &DiscoverOptions) -> Result<Vec<PathBuf>, RegistryError> {
    if !root.is_dir() {
        return Err(RegistryError::RootMissing {
            root: root.to_path_buf(),
        });
    }

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(options.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(options.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }

        match DocumentFormat::from_path(path) {
            Some(format) if options.formats.contains(&format) => files.push(path.to_path_buf()),
            _ => tracing::debug!(path = %path.display(), "unsupported file format"),
        }
    }

    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, RegistryError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| RegistryError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| RegistryError::Pattern {
        pattern: patterns.join(", "),
        source,
    })
}

/// Process-wide memo of discovered registries, one per canonical root.
///
/// Discovery holds the lock, so concurrent first requests for a root build
/// it once. Failed discoveries are not cached.
pub struct RegistryCache {
    options: DiscoverOptions,
    embedder: Arc<dyn Embedder>,
    registries: Mutex<HashMap<PathBuf, Arc<Registry>>>,
}

impl RegistryCache {
    pub fn new(options: DiscoverOptions, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            options,
            embedder,
            registries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the registry for `root`, discovering it on first use.
    pub async fn get_or_discover(&self, root: &Path) -> Result<Arc<Registry>, RegistryError> {
        let key = root
            .canonicalize()
            .map_err(|_| RegistryError::RootMissing {
                root: root.to_path_buf(),
            })?;

        let mut registries = self.registries.lock().await;
        if let Some(registry) = registries.get(&key) {
            return Ok(registry.clone());
        }

        let registry = Arc::new(Registry::discover(&key, &self.options, self.embedder.clone()).await?);
        registries.insert(key, registry.clone());
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scan_filters_by_extension_case_insensitively() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("week1/slides")).unwrap();
        fs::write(root.join("a.TXT"), "a").unwrap();
        fs::write(root.join("week1/b.pdf"), "b").unwrap();
        fs::write(root.join("week1/slides/c.Pptx"), "c").unwrap();
        fs::write(root.join("week1/d.xyz"), "d").unwrap();
        fs::write(root.join("e.md"), "e").unwrap();

        let files = scan_corpus(root, &DiscoverOptions::default()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.TXT", "b.pdf", "c.Pptx"]);
    }

    #[test]
    fn scan_honours_configured_formats_and_excludes() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("keep.txt"), "k").unwrap();
        fs::write(root.join("skip.pdf"), "s").unwrap();
        fs::write(root.join("drafts/wip.txt"), "w").unwrap();
        fs::write(root.join(".git/notes.txt"), "g").unwrap();

        let options = DiscoverOptions {
            formats: vec![DocumentFormat::Txt],
            exclude_globs: vec!["drafts/**".to_string()],
            ..DiscoverOptions::default()
        };
        let files = scan_corpus(root, &options).unwrap();
        assert_eq!(files, vec![root.join("keep.txt")]);
    }

    #[test]
    fn scan_missing_root_is_an_error() {
        let err = scan_corpus(Path::new("/definitely/not/here"), &DiscoverOptions::default())
            .unwrap_err();
        assert!(matches!(err, RegistryError::RootMissing { .. }));
    }

    struct LengthEmbedder;

    #[async_trait::async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> Option<usize> {
            Some(2)
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::error::EmbeddingError> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    #[tokio::test]
    async fn discover_indexes_only_supported_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("syllabus.txt"), "Week one covers processes.").unwrap();
        fs::write(tmp.path().join("data.xyz"), "ignored").unwrap();

        let registry = Registry::discover(tmp.path(), &DiscoverOptions::default(), Arc::new(LengthEmbedder))
            .await
            .unwrap();
        assert_eq!(registry.len(), 1);
        let names: Vec<&str> = registry.documents().map(|d| d.display_name.as_str()).collect();
        assert_eq!(names, vec!["syllabus"]);
        assert!(registry.find("syllabus").is_some());
        assert!(registry.get(&tmp.path().join("syllabus.txt")).is_some());
        assert!(registry.find("data").is_none());
    }

    #[tokio::test]
    async fn discover_skips_unparseable_documents() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("intro.txt"), "Hello.").unwrap();
        fs::write(tmp.path().join("broken.pdf"), b"not a pdf").unwrap();

        let registry = Registry::discover(tmp.path(), &DiscoverOptions::default(), Arc::new(LengthEmbedder))
            .await
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.skipped().len(), 1);
        assert!(registry.skipped()[0].path.ends_with("broken.pdf"));
    }

    #[tokio::test]
    async fn discover_without_supported_files_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("readme.md"), "# nothing").unwrap();

        let err = Registry::discover(tmp.path(), &DiscoverOptions::default(), Arc::new(LengthEmbedder))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NoDocuments { .. }));
    }

    #[tokio::test]
    async fn discover_fails_when_no_document_is_indexable() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.pdf"), b"not a pdf").unwrap();

        let err = Registry::discover(tmp.path(), &DiscoverOptions::default(), Arc::new(LengthEmbedder))
            .await
            .unwrap_err();
        match err {
            RegistryError::NoDocuments { failed, .. } => assert_eq!(failed, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Panics on any text mentioning "boom".
    struct PanickingEmbedder;

    #[async_trait::async_trait]
    impl Embedder for PanickingEmbedder {
        fn model_name(&self) -> &str {
            "panicking"
        }
        fn dims(&self) -> Option<usize> {
            Some(2)
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::error::EmbeddingError> {
            if text.contains("boom") {
                panic!("embedder crashed");
            }
            Ok(vec![1.0, 0.0])
        }
    }

    #[tokio::test]
    async fn crashed_indexing_task_is_reported_as_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("fine.txt"), "Quorum reads.").unwrap();
        fs::write(tmp.path().join("bad.txt"), "boom").unwrap();

        let registry = Registry::discover(tmp.path(), &DiscoverOptions::default(), Arc::new(PanickingEmbedder))
            .await
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.skipped().len(), 1);
        assert!(registry.skipped()[0].path.ends_with("bad.txt"));
        assert!(registry.skipped()[0].reason.contains("crashed"));
    }

    #[tokio::test]
    async fn keys_are_sorted_regardless_of_parallelism() {
        let tmp = TempDir::new().unwrap();
        for name in ["d.txt", "b.txt", "a.txt", "c.txt"] {
            fs::write(tmp.path().join(name), name).unwrap();
        }
        let options = DiscoverOptions {
            max_parallel_documents: 3,
            ..DiscoverOptions::default()
        };
        let registry = Registry::discover(tmp.path(), &options, Arc::new(LengthEmbedder))
            .await
            .unwrap();
        let keys: Vec<&str> = registry.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 4);
    }

    #[tokio::test]
    async fn cache_returns_the_same_registry() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "Threads share memory.").unwrap();

        let cache = RegistryCache::new(DiscoverOptions::default(), Arc::new(LengthEmbedder));
        let first = cache.get_or_discover(tmp.path()).await.unwrap();
        let second = cache.get_or_discover(tmp.path()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn invalid_exclude_glob_is_reported() {
        let tmp = TempDir::new().unwrap();
        let options = DiscoverOptions {
            exclude_globs: vec!["[".to_string()],
            ..DiscoverOptions::default()
        };
        let err = scan_corpus(tmp.path(), &options).unwrap_err();
        assert!(matches!(err, RegistryError::Pattern { .. }));
    }
}
