use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use super::classify::Classifier;
use super::model::Job;

/// Splits plain text into items: one per line, trimmed, skipping blank lines
/// and lines starting with `#`.
pub fn parse_item_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Turns raw items into jobs, dropping the ones the classifier rejects.
pub fn load_jobs<I, S>(items: I, classifier: &dyn Classifier) -> Vec<Job>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .filter_map(|item| {
            let item = item.as_ref();
            match classifier.classify(item) {
                Some(kind) => Some(Job::new(item, kind)),
                None => {
                    debug!(item, "skipping unclassified item");
                    None
                }
            }
        })
        .collect()
}

/// Reads the targets file and classifies its items.
///
/// A missing file yields an empty list; the caller decides whether that is
/// fatal.
pub fn load_jobs_from_file(path: &Path, classifier: &dyn Classifier) -> Result<Vec<Job>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(load_jobs(parse_item_lines(&text), classifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobKind, PatternClassifier};

    #[test]
    fn parse_skips_comments_and_blanks() {
        let text = "# header\n\n  v1  \nv2\n   \n#v3\nv4";
        assert_eq!(parse_item_lines(text), vec!["v1", "v2", "v4"]);
    }

    #[test]
    fn load_jobs_filters_rejected_items() {
        let classifier = |item: &str| (item != "bad").then_some(JobKind::A);
        let jobs = load_jobs(["v1", "bad", "v3"], &classifier);
        let ids: Vec<_> = jobs.iter().map(Job::id).collect();
        assert_eq!(ids, vec!["v1", "v3"]);
    }

    #[test]
    fn load_from_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let jobs =
            load_jobs_from_file(&dir.path().join("nope.txt"), &PatternClassifier::accept_all())
                .unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn load_from_file_classifies_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.txt");
        std::fs::write(&path, "# targets\nv1\nv2\n").unwrap();

        let jobs = load_jobs_from_file(&path, &PatternClassifier::accept_all()).unwrap();
        assert_eq!(jobs, vec![Job::new("v1", JobKind::A), Job::new("v2", JobKind::A)]);
    }
}
