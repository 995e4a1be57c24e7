//! Persisted fingerprint ledger
//!
//! A versioned TOML record of the last-known content fingerprint per module,
//! kept at a fixed location under the source root and rewritten in full
//! after every compilation pass. The ledger is advisory: losing it forces
//! recompilation, never incorrect behavior, so loading tolerates a missing,
//! corrupt, or version-mismatched file and saving is best-effort.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fingerprint::Fingerprint;
use crate::fs::atomic_write;
use crate::ident::ModuleId;

/// Ledger format version. Bump when changing the persisted representation.
pub const LEDGER_VERSION: u32 = 1;

/// File name of the ledger under the reserved engine directory.
pub const LEDGER_FILE: &str = "ledger.toml";

/// TOML representation of the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TomlLedger {
    version: u32,
    #[serde(default)]
    modules: BTreeMap<String, String>,
}

/// Load the persisted ledger.
///
/// A missing file, unparsable contents, or a version mismatch all yield the
/// empty map: every module is then treated as changed.
pub fn load(path: &Path) -> BTreeMap<ModuleId, Fingerprint> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return BTreeMap::new(),
    };

    let parsed: TomlLedger = match toml::from_str(&content) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ledger unreadable, treating all modules as changed");
            return BTreeMap::new();
        }
    };

    if parsed.version != LEDGER_VERSION {
        warn!(
            found = parsed.version,
            expected = LEDGER_VERSION,
            "ledger version mismatch, treating all modules as changed"
        );
        return BTreeMap::new();
    }

    parsed
        .modules
        .into_iter()
        .map(|(id, fp)| (ModuleId::new(id), Fingerprint::parse(&fp)))
        .collect()
}

/// Persist the full ledger atomically.
///
/// Best-effort: failures are logged and swallowed, because the in-memory
/// cache stays correct regardless of what is on disk.
pub fn save(path: &Path, entries: &BTreeMap<ModuleId, Fingerprint>) {
    let modules = entries
        .iter()
        .map(|(id, fp)| (id.to_string(), fp.to_string()))
        .collect();
    let ledger = TomlLedger {
        version: LEDGER_VERSION,
        modules,
    };

    let content = match toml::to_string_pretty(&ledger) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, "could not serialize ledger");
            return;
        }
    };

    if let Err(e) = atomic_write(path, content.as_bytes()) {
        warn!(path = %path.display(), error = %e, "could not persist ledger");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entries(pairs: &[(&str, &str)]) -> BTreeMap<ModuleId, Fingerprint> {
        pairs
            .iter()
            .map(|(id, fp)| (ModuleId::new(*id), Fingerprint::parse(fp)))
            .collect()
    }

    #[test]
    fn load_nonexistent_returns_empty() {
        assert!(load(Path::new("/nonexistent/ledger.toml")).is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.toml");

        let saved = entries(&[("A", "sha256:abc123"), ("sub/B", "sha256:def456")]);
        save(&path, &saved);

        let loaded = load(&path);
        assert_eq!(loaded, saved);
    }

    #[test]
    fn corrupt_ledger_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "this is { not toml").unwrap();

        assert!(load(&path).is_empty());
    }

    #[test]
    fn version_mismatch_is_treated_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(&path, "version = 999\n\n[modules]\nA = \"sha256:abc\"\n").unwrap();

        assert!(load(&path).is_empty());
    }

    #[test]
    fn format_is_versioned_and_human_diffable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.toml");

        save(&path, &entries(&[("A", "sha256:abc"), ("sub/B", "sha256:def")]));

        let content = std::fs::read_to_string(&path).unwrap();
        insta::assert_snapshot!(content, @r#"
        version = 1

        [modules]
        A = "sha256:abc"
        "sub/B" = "sha256:def"
        "#);
    }

    #[test]
    fn save_fully_rewrites_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.toml");

        save(&path, &entries(&[("A", "sha256:aaa"), ("B", "sha256:bbb")]));
        save(&path, &entries(&[("A", "sha256:aaa")]));

        let loaded = load(&path);
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key(&ModuleId::new("A")));
        assert!(!loaded.contains_key(&ModuleId::new("B")));
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".unite").join("ledger.toml");

        save(&path, &entries(&[("A", "sha256:abc")]));

        assert!(path.exists());
    }
}
