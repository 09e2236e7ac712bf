//! Atomic file writes for the export directory

use civi_common::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Serialize `value` to `<path>.tmp`, then rename over `path`
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(tmp_path, bytes)?;
    fs::rename(tmp_path, path)?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// `XYZ.json` file names hold country documents
fn country_code_of(file_name: &str) -> Option<&str> {
    let code = file_name.strip_suffix(".json")?;
    (code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())).then_some(code)
}

/// Remove country documents whose code is not in `keep`
///
/// Returns the number of files removed. Leftover `.tmp` files are removed too.
pub fn remove_stale_country_files(dir: &Path, keep: &BTreeSet<String>) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        let stale = match country_code_of(name) {
            Some(code) => !keep.contains(code),
            None => name.ends_with(".json.tmp"),
        };
        if stale && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            debug!("Removed stale export file {}", name);
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_json_atomic_leaves_no_tmp() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("USA.json");

        write_json_atomic(&path, &json!({"name": "USA"})).unwrap();
        write_json_atomic(&path, &json!({"name": "United States"})).unwrap();

        let content: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(content["name"], "United States");
        assert!(!temp.path().join("USA.json.tmp").exists());
    }

    #[test]
    fn test_remove_stale_country_files() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["USA.json", "TLS.json", "metadata.json", "FRA.json.tmp", "notes.txt"] {
            fs::write(temp.path().join(name), "{}").unwrap();
        }

        let keep: BTreeSet<String> = ["USA".to_string()].into_iter().collect();
        let removed = remove_stale_country_files(temp.path(), &keep).unwrap();

        assert_eq!(removed, 2);
        assert!(temp.path().join("USA.json").exists());
        assert!(!temp.path().join("TLS.json").exists());
        assert!(temp.path().join("metadata.json").exists());
        assert!(temp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_country_code_of() {
        assert_eq!(country_code_of("USA.json"), Some("USA"));
        assert_eq!(country_code_of("metadata.json"), None);
        assert_eq!(country_code_of("usa.json"), None);
    }
}
