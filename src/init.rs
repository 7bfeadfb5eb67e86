//! Creates the starter input files for a new working directory.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

const TARGETS_HEADER: &str = "# Items to process, one per line.\n\
# Blank lines and lines starting with # are ignored.\n";

const WATCH_HEADER: &str = "# Append items here while `tailpool watch` is running.\n\
# Each new line is processed once, as soon as it is complete.\n";

/// Writes the starter files that do not exist yet and returns the ones created.
pub fn create_default_files(targets: &Path, watch: &Path) -> Result<Vec<String>> {
    let mut created = Vec::new();
    for (path, header) in [(targets, TARGETS_HEADER), (watch, WATCH_HEADER)] {
        if path.exists() {
            continue;
        }
        std::fs::write(path, header)
            .with_context(|| format!("failed to create {}", path.display()))?;
        info!(path = %path.display(), "created");
        created.push(path.display().to_string());
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::parse_item_lines;

    #[test]
    fn creates_missing_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let targets = dir.path().join("targets.txt");
        let watch = dir.path().join("watch.txt");
        std::fs::write(&targets, "keep\n").unwrap();

        let created = create_default_files(&targets, &watch).unwrap();

        assert_eq!(created, vec![watch.display().to_string()]);
        assert_eq!(std::fs::read_to_string(&targets).unwrap(), "keep\n");
        let header = std::fs::read_to_string(&watch).unwrap();
        assert!(parse_item_lines(&header).is_empty());
    }
}
