//! Code bundle reconciler: content-addressed uploads of Lua artifacts.
//!
//! Uploaded content is immutable once published, so this resource has no
//! in-place update path: any change to its identity or content is a
//! replacement. The prepared content's sha-256 digest is the sole change
//! signal for the content itself.

use crate::bundle;
use crate::error::{Error, Result};
use crate::network::CodeStore;
use crate::provider::{CheckFailure, CreateResult, DiffResult, ResourceProvider};
use crate::tags::Tag;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Declared state of an uploaded code artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBundleSpec {
    pub name: String,
    /// Output-only: identity that performed the upload
    #[serde(default)]
    pub owner: String,
    pub file_path: PathBuf,
    /// Whether to statically bundle transitive requires before upload
    #[serde(default)]
    pub bundle_lua_code: bool,
    /// Output-only: digest of the uploaded content
    #[serde(default)]
    pub sha256: String,
}

/// Reconciler for code bundle resources.
pub struct CodeBundleProvider<S> {
    store: S,
}

impl<S> CodeBundleProvider<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: CodeStore> ResourceProvider for CodeBundleProvider<S> {
    type Inputs = CodeBundleSpec;

    fn check(&self, _olds: Option<&CodeBundleSpec>, news: &CodeBundleSpec) -> Vec<CheckFailure> {
        let mut failures = Vec::new();
        if !news.file_path.is_file() {
            failures.push(CheckFailure::new(
                "filePath",
                format!("file not found: {}", news.file_path.display()),
            ));
        }
        failures
    }

    /// Identity changes replace unconditionally; on top of that the content
    /// digest is always recomputed from the new inputs and compared against
    /// the recorded one.
    fn diff(&self, _id: &str, olds: &CodeBundleSpec, news: &CodeBundleSpec) -> Result<DiffResult> {
        let mut replaces = Vec::new();
        if olds.name != news.name {
            replaces.push("name".to_string());
        }
        if olds.file_path != news.file_path {
            replaces.push("filePath".to_string());
        }

        let content = bundle::prepare_content(&news.file_path, news.bundle_lua_code)?;
        if bundle::hash_text(&content) != olds.sha256 {
            replaces.push("sha256".to_string());
        }

        let changes = !replaces.is_empty();
        Ok(DiffResult { changes, replaces })
    }

    fn create(&self, news: &CodeBundleSpec) -> Result<CreateResult<CodeBundleSpec>> {
        let content = bundle::prepare_content(&news.file_path, news.bundle_lua_code)?;
        let digest = bundle::hash_text(&content);

        let receipt = self.store.upload(
            &content,
            &[
                Tag::new("Name", news.name.clone()),
                Tag::new("Sha256", digest.clone()),
            ],
        )?;
        log::info!("uploaded bundle {} ({})", receipt.id, news.name);

        let outputs = CodeBundleSpec {
            name: news.name.clone(),
            owner: receipt.owner,
            file_path: news.file_path.clone(),
            bundle_lua_code: news.bundle_lua_code,
            sha256: digest,
        };
        Ok(CreateResult {
            id: receipt.id,
            outputs,
        })
    }

    fn update(
        &self,
        _id: &str,
        _olds: &CodeBundleSpec,
        _news: &CodeBundleSpec,
    ) -> Result<CodeBundleSpec> {
        Err(Error::Other(
            "code bundles are immutable; every change is a replacement".to_string(),
        ))
    }

    fn read(&self, _id: &str) -> Result<CodeBundleSpec> {
        Err(Error::Other(
            "code bundles do not support refresh".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::UploadReceipt;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    #[derive(Default)]
    struct StoreLog {
        uploads: RefCell<Vec<(String, Vec<Tag>)>>,
    }

    #[derive(Default, Clone)]
    struct FakeStore(Rc<StoreLog>);

    impl CodeStore for FakeStore {
        fn upload(&self, content: &str, tags: &[Tag]) -> Result<UploadReceipt> {
            self.0
                .uploads
                .borrow_mut()
                .push((content.to_string(), tags.to_vec()));
            Ok(UploadReceipt {
                id: "bundle-1".to_string(),
                owner: "uploader".to_string(),
            })
        }
    }

    fn spec_for(path: PathBuf) -> CodeBundleSpec {
        CodeBundleSpec {
            name: "agent".to_string(),
            file_path: path,
            ..CodeBundleSpec::default()
        }
    }

    #[test]
    fn test_check_reports_missing_file() {
        let p = CodeBundleProvider::new(FakeStore::default());
        let spec = spec_for(PathBuf::from("/nonexistent/agent.lua"));
        let failures = p.check(None, &spec);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].property, "filePath");
    }

    #[test]
    fn test_create_uploads_with_name_and_digest_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.lua");
        fs::write(&path, "return 1").unwrap();

        let store = FakeStore::default();
        let p = CodeBundleProvider::new(store.clone());
        let result = p.create(&spec_for(path.clone())).unwrap();

        assert_eq!(result.id, "bundle-1");
        assert_eq!(result.outputs.owner, "uploader");
        assert_eq!(result.outputs.sha256, bundle::hash_text("return 1"));
        assert_eq!(result.outputs.file_path, path);

        let uploads = store.0.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "return 1");
        assert_eq!(
            uploads[0].1,
            vec![
                Tag::new("Name", "agent"),
                Tag::new("Sha256", bundle::hash_text("return 1")),
            ]
        );
    }

    #[test]
    fn test_diff_unchanged_content_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.lua");
        fs::write(&path, "return 1").unwrap();

        let p = CodeBundleProvider::new(FakeStore::default());
        let olds = CodeBundleSpec {
            sha256: bundle::hash_text("return 1"),
            ..spec_for(path.clone())
        };
        let news = spec_for(path);

        let diff = p.diff("bundle-1", &olds, &news).unwrap();
        assert!(!diff.changes);
        assert!(diff.replaces.is_empty());
    }

    #[test]
    fn test_diff_content_change_replaces_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.lua");
        fs::write(&path, "return 2").unwrap();

        let p = CodeBundleProvider::new(FakeStore::default());
        let olds = CodeBundleSpec {
            sha256: bundle::hash_text("return 1"),
            ..spec_for(path.clone())
        };
        let news = spec_for(path);

        let diff = p.diff("bundle-1", &olds, &news).unwrap();
        assert!(diff.changes);
        assert_eq!(diff.replaces, vec!["sha256".to_string()]);
    }

    #[test]
    fn test_diff_moved_file_with_same_content_replaces_path_only() {
        let dir = tempfile::tempdir().unwrap();
        let old_path = dir.path().join("agent.lua");
        let new_path = dir.path().join("moved.lua");
        fs::write(&old_path, "return 1").unwrap();
        fs::write(&new_path, "return 1").unwrap();

        let p = CodeBundleProvider::new(FakeStore::default());
        let olds = CodeBundleSpec {
            sha256: bundle::hash_text("return 1"),
            ..spec_for(old_path)
        };
        let news = CodeBundleSpec {
            sha256: bundle::hash_text("return 1"),
            ..spec_for(new_path)
        };

        let diff = p.diff("bundle-1", &olds, &news).unwrap();
        assert!(diff.changes);
        assert_eq!(diff.replaces, vec!["filePath".to_string()]);
    }

    #[test]
    fn test_diff_name_change_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.lua");
        fs::write(&path, "return 1").unwrap();

        let p = CodeBundleProvider::new(FakeStore::default());
        let olds = CodeBundleSpec {
            sha256: bundle::hash_text("return 1"),
            ..spec_for(path.clone())
        };
        let news = CodeBundleSpec {
            name: "renamed".to_string(),
            ..spec_for(path)
        };

        let diff = p.diff("bundle-1", &olds, &news).unwrap();
        assert_eq!(diff.replaces, vec!["name".to_string()]);
    }

    #[test]
    fn test_update_is_rejected() {
        let p = CodeBundleProvider::new(FakeStore::default());
        let spec = spec_for(PathBuf::from("agent.lua"));
        assert!(p.update("bundle-1", &spec, &spec).is_err());
    }
}
