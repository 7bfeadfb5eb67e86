//! Live import: follows a growing text file and emits each newly appended,
//! newline-terminated line exactly once.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::job::{Classifier, Job, parse_item_lines};
use crate::session::RunState;

/// Byte watermark into the watched file plus every line already emitted.
///
/// `offset` only ever moves forward and always sits just past a newline, so
/// a partially written trailing line is re-read on the next tick.
#[derive(Debug, Default)]
pub struct ImportCursor {
    offset: u64,
    seen: HashSet<String>,
}

impl ImportCursor {
    fn with_seen(seen: HashSet<String>) -> Self {
        Self { offset: 0, seen }
    }

    #[allow(dead_code)]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[allow(dead_code)]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Consumes the complete lines in `chunk` (read from `offset`), returning
    /// the ones not seen before. A trailing fragment without `\n` is left for
    /// the next call.
    fn advance(&mut self, chunk: &[u8]) -> Vec<String> {
        let Some(last_newline) = chunk.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let complete = &chunk[..=last_newline];
        self.offset += complete.len() as u64;

        parse_item_lines(&String::from_utf8_lossy(complete))
            .into_iter()
            .filter(|line| self.seen.insert(line.clone()))
            .collect()
    }
}

#[derive(Debug)]
enum TailState {
    /// File absent. The seen-set outlives the cursor so a recreated file
    /// never re-emits old lines.
    Idle { seen: HashSet<String> },
    Watching(ImportCursor),
}

/// Tail-follow reader over one file.
#[derive(Debug)]
pub struct FileTail {
    path: PathBuf,
    state: TailState,
}

impl FileTail {
    /// Takes the baseline immediately. With `import_existing = false`, lines
    /// already in the file are marked as seen and the cursor starts after the
    /// last complete one; anything written after this call is new. An absent
    /// file starts Idle and all of its later content is new.
    pub fn new(path: impl Into<PathBuf>, import_existing: bool) -> io::Result<Self> {
        let path = path.into();
        let mut tail = Self {
            path,
            state: TailState::Idle {
                seen: HashSet::new(),
            },
        };
        if !import_existing && tail.path.exists() {
            let mut cursor = ImportCursor::default();
            let existing = read_from(&tail.path, 0)?;
            let skipped = cursor.advance(&existing).len();
            debug!(path = %tail.path.display(), skipped, "skipping existing lines");
            tail.state = TailState::Watching(cursor);
        }
        Ok(tail)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[allow(dead_code)]
    pub fn is_watching(&self) -> bool {
        matches!(self.state, TailState::Watching(_))
    }

    #[allow(dead_code)]
    pub fn cursor(&self) -> Option<&ImportCursor> {
        match &self.state {
            TailState::Watching(cursor) => Some(cursor),
            TailState::Idle { .. } => None,
        }
    }

    /// One poll tick: returns the new lines appended since the last tick.
    ///
    /// Blocking file IO; async callers go through `spawn_blocking`.
    pub fn poll(&mut self) -> io::Result<Vec<String>> {
        let len = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.go_idle();
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if let TailState::Idle { seen } = &mut self.state {
            let cursor = ImportCursor::with_seen(std::mem::take(seen));
            info!(path = %self.path.display(), "watching file");
            self.state = TailState::Watching(cursor);
        }

        let TailState::Watching(cursor) = &mut self.state else {
            return Ok(Vec::new());
        };
        if len < cursor.offset {
            warn!(
                path = %self.path.display(),
                len,
                offset = cursor.offset,
                "watched file shrank; waiting for it to grow past the cursor"
            );
            return Ok(Vec::new());
        }
        if len == cursor.offset {
            return Ok(Vec::new());
        }
        let chunk = read_from(&self.path, cursor.offset)?;
        Ok(cursor.advance(&chunk))
    }

    fn go_idle(&mut self) {
        if let TailState::Watching(cursor) = &mut self.state {
            debug!(path = %self.path.display(), "watched file unavailable");
            let seen = std::mem::take(&mut cursor.seen);
            self.state = TailState::Idle { seen };
        }
    }
}

fn read_from(path: &Path, offset: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Spawns the poll loop. Classified lines are sent as jobs on `tx`; the loop
/// ends once the session stops running or the receiver goes away.
pub fn spawn_importer(
    mut tail: FileTail,
    classifier: Arc<dyn Classifier>,
    state: RunState,
    interval: Duration,
    tx: mpsc::Sender<Job>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while state.is_running() {
            let polled = tokio::task::spawn_blocking(move || {
                let lines = tail.poll();
                (tail, lines)
            })
            .await;
            let lines = match polled {
                Ok((returned, lines)) => {
                    tail = returned;
                    lines
                }
                Err(e) => {
                    warn!(error = %e, "poll task failed; importer stopping");
                    return;
                }
            };
            match lines {
                Ok(lines) => {
                    for line in lines {
                        let Some(kind) = classifier.classify(&line) else {
                            warn!(item = %line, "skipping unclassified item");
                            continue;
                        };
                        info!(item = %line, "imported");
                        if tx.send(Job::new(line, kind)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => warn!(path = %tail.path().display(), error = %e, "poll failed; retrying"),
            }
            sleep(interval).await;
        }
        debug!("importer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKind;
    use std::fs::OpenOptions;
    use std::io::Write;

    fn append(path: &Path, text: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn emits_only_terminated_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.txt");
        let mut tail = FileTail::new(&path, false).unwrap();

        assert!(tail.poll().unwrap().is_empty());
        assert!(!tail.is_watching());

        append(&path, "a\nb\n");
        assert_eq!(tail.poll().unwrap(), vec!["a", "b"]);

        append(&path, "c");
        assert!(tail.poll().unwrap().is_empty());
        assert_eq!(tail.cursor().unwrap().offset(), 4);

        append(&path, "\n");
        assert_eq!(tail.poll().unwrap(), vec!["c"]);
        assert_eq!(tail.cursor().unwrap().offset(), 6);
        assert!(tail.poll().unwrap().is_empty());
    }

    #[test]
    fn duplicate_lines_are_not_reemitted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.txt");
        std::fs::write(&path, "").unwrap();
        let mut tail = FileTail::new(&path, false).unwrap();
        assert!(tail.poll().unwrap().is_empty());

        append(&path, "x\ny\nx\n");
        assert_eq!(tail.poll().unwrap(), vec!["x", "y"]);

        append(&path, "y\nz\n");
        assert_eq!(tail.poll().unwrap(), vec!["z"]);
        assert_eq!(tail.cursor().unwrap().seen_count(), 3);
    }

    #[test]
    fn skips_comments_blanks_and_carriage_returns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.txt");
        let mut tail = FileTail::new(&path, true).unwrap();

        append(&path, "# note\n\n  item1 \r\nitem2\r\n");
        assert_eq!(tail.poll().unwrap(), vec!["item1", "item2"]);
    }

    #[test]
    fn existing_lines_skipped_unless_imported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.txt");
        std::fs::write(&path, "old1\nold2\npart").unwrap();

        let mut skipping = FileTail::new(&path, false).unwrap();
        assert!(skipping.poll().unwrap().is_empty());
        append(&path, "ial\nold1\nnew\n");
        assert_eq!(skipping.poll().unwrap(), vec!["partial", "new"]);

        let mut importing = FileTail::new(&path, true).unwrap();
        assert_eq!(
            importing.poll().unwrap(),
            vec!["old1", "old2", "partial", "new"]
        );
    }

    #[test]
    fn lines_written_before_first_poll_are_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.txt");
        std::fs::write(&path, "old\n").unwrap();
        let mut tail = FileTail::new(&path, false).unwrap();
        assert_eq!(tail.cursor().unwrap().offset(), 4);

        append(&path, "fresh\n");
        assert_eq!(tail.poll().unwrap(), vec!["fresh"]);
    }

    #[test]
    fn file_created_after_start_is_read_from_the_top() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.txt");
        let mut tail = FileTail::new(&path, false).unwrap();
        assert!(!tail.is_watching());

        append(&path, "a\nb\n");
        assert_eq!(tail.poll().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn recreated_file_keeps_seen_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.txt");
        let mut tail = FileTail::new(&path, true).unwrap();

        append(&path, "a\nb\n");
        assert_eq!(tail.poll().unwrap(), vec!["a", "b"]);

        std::fs::remove_file(&path).unwrap();
        assert!(tail.poll().unwrap().is_empty());
        assert!(!tail.is_watching());

        append(&path, "b\nc\n");
        assert_eq!(tail.poll().unwrap(), vec!["c"]);
        assert!(tail.is_watching());
    }

    #[test]
    fn shrunk_file_holds_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.txt");
        let mut tail = FileTail::new(&path, true).unwrap();

        append(&path, "first\nsecond\n");
        assert_eq!(tail.poll().unwrap().len(), 2);
        let offset = tail.cursor().unwrap().offset();

        std::fs::write(&path, "x\n").unwrap();
        assert!(tail.poll().unwrap().is_empty());
        assert_eq!(tail.cursor().unwrap().offset(), offset);
    }

    #[tokio::test]
    async fn importer_sends_classified_jobs_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watch.txt");
        let state = RunState::new();
        let (tx, mut rx) = mpsc::channel(8);
        let classifier: Arc<dyn Classifier> =
            Arc::new(|item: &str| (!item.starts_with("skip")).then_some(JobKind::A));

        let handle = spawn_importer(
            FileTail::new(&path, false).unwrap(),
            classifier,
            state.clone(),
            Duration::from_millis(10),
            tx,
        );

        append(&path, "a\nskip-me\nb\n");
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.id(), "a");
        assert_eq!(second.id(), "b");

        state.request_stop();
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
