//! Lua source loading, static bundling, and content digests.
//!
//! A code bundle is either a raw file or the file with its transitive
//! `require`d modules inlined as preloaded chunks, so a process can boot from
//! a single artifact. The sha-256 digest of the prepared content is the sole
//! change signal for uploads.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Module names resolved by the runtime itself, never inlined.
const RUNTIME_MODULES: &[&str] = &["json", ".crypto", ".base64", ".pretty", ".utils"];

static REQUIRE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\(\s*["']([^"']+)["']\s*\)"#).expect("require pattern is valid")
});

/// Base64 sha-256 digest of text content.
pub fn hash_text(text: &str) -> String {
    STANDARD.encode(Sha256::digest(text.as_bytes()))
}

/// Read a Lua source file without bundling.
pub fn load_lua_code(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::Bundle {
        message: format!("could not read {}: {e}", path.display()),
    })
}

/// Produce upload content for a bundle: raw file, or statically bundled
/// with transitive requires inlined.
pub fn prepare_content(path: &Path, bundle: bool) -> Result<String> {
    if bundle {
        bundle_lua_code(path)
    } else {
        load_lua_code(path)
    }
}

/// Statically bundle a Lua entry point. Every `require("mod")` whose module
/// resolves to a file relative to the entry point is emitted once as a
/// `package.loaded` chunk ahead of the entry source; runtime modules and
/// unresolvable names are left for the process to resolve itself.
pub fn bundle_lua_code(entry: &Path) -> Result<String> {
    let root = entry.parent().unwrap_or_else(|| Path::new("."));
    let entry_source = load_lua_code(entry)?;

    let mut chunks = Vec::new();
    let mut seen = BTreeSet::new();
    inline_requires(root, &entry_source, &mut seen, &mut chunks)?;

    chunks.push(entry_source);
    Ok(chunks.join("\n"))
}

/// Depth-first walk over required modules, emitting each resolved module
/// exactly once before its dependents.
fn inline_requires(
    root: &Path,
    source: &str,
    seen: &mut BTreeSet<String>,
    chunks: &mut Vec<String>,
) -> Result<()> {
    for capture in REQUIRE_PATTERN.captures_iter(source) {
        let module = &capture[1];
        if RUNTIME_MODULES.contains(&module) || seen.contains(module) {
            continue;
        }
        let Some(path) = resolve_module(root, module) else {
            continue;
        };

        seen.insert(module.to_string());
        let module_source = load_lua_code(&path)?;
        inline_requires(root, &module_source, seen, chunks)?;
        chunks.push(format!(
            "package.loaded[\"{module}\"] = (function()\n{module_source}\nend)()"
        ));
    }
    Ok(())
}

/// Map a module name to a file under the entry point's directory
/// (`a.b` -> `a/b.lua`).
fn resolve_module(root: &Path, module: &str) -> Option<PathBuf> {
    let relative = format!("{}.lua", module.replace('.', "/"));
    let path = root.join(relative);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_hash_text_is_stable_base64() {
        let digest = hash_text("print('hello')");
        assert_eq!(digest, hash_text("print('hello')"));
        assert_ne!(digest, hash_text("print('other')"));
        // base64 of a 32-byte digest
        assert_eq!(digest.len(), 44);
        assert!(digest.ends_with('='));
    }

    #[test]
    fn test_load_lua_code_missing_file() {
        let err = load_lua_code(Path::new("/nonexistent/main.lua")).unwrap_err();
        assert!(matches!(err, Error::Bundle { .. }));
    }

    #[test]
    fn test_prepare_content_raw_returns_file_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.lua");
        fs::write(&entry, "local x = require(\"util\")\nprint(x)\n").unwrap();

        let content = prepare_content(&entry, false).unwrap();
        assert_eq!(content, "local x = require(\"util\")\nprint(x)\n");
    }

    #[test]
    fn test_bundle_inlines_sibling_module() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("util.lua"), "return { answer = 42 }").unwrap();
        let entry = dir.path().join("main.lua");
        fs::write(&entry, "local util = require(\"util\")\nprint(util.answer)").unwrap();

        let bundled = bundle_lua_code(&entry).unwrap();
        assert!(bundled.contains("package.loaded[\"util\"]"));
        assert!(bundled.contains("return { answer = 42 }"));
        // entry source comes last
        assert!(bundled.ends_with("print(util.answer)"));
    }

    #[test]
    fn test_bundle_inlines_transitive_requires_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.lua"), "return {}").unwrap();
        fs::write(
            dir.path().join("mid.lua"),
            "local base = require(\"base\")\nreturn base",
        )
        .unwrap();
        let entry = dir.path().join("main.lua");
        fs::write(
            &entry,
            "local mid = require(\"mid\")\nlocal base = require(\"base\")",
        )
        .unwrap();

        let bundled = bundle_lua_code(&entry).unwrap();
        assert_eq!(bundled.matches("package.loaded[\"base\"]").count(), 1);
        // dependency chunk precedes its dependent
        let base_at = bundled.find("package.loaded[\"base\"]").unwrap();
        let mid_at = bundled.find("package.loaded[\"mid\"]").unwrap();
        assert!(base_at < mid_at);
    }

    #[test]
    fn test_bundle_leaves_runtime_modules_alone() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("main.lua");
        fs::write(&entry, "local json = require(\"json\")\nprint(json)").unwrap();

        let bundled = bundle_lua_code(&entry).unwrap();
        assert!(!bundled.contains("package.loaded"));
        assert!(bundled.contains("require(\"json\")"));
    }

    #[test]
    fn test_same_content_different_path_same_digest() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.lua");
        let b = dir.path().join("b.lua");
        fs::write(&a, "return 1").unwrap();
        fs::write(&b, "return 1").unwrap();

        let digest_a = hash_text(&prepare_content(&a, false).unwrap());
        let digest_b = hash_text(&prepare_content(&b, false).unwrap());
        assert_eq!(digest_a, digest_b);
    }
}
