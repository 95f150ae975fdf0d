use crate::error::CollectorError;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Longest single sleep, so a stop request is noticed promptly
const SLEEP_SLICE: Duration = Duration::from_millis(500);

/// Default cap on a single line, including any partial line still being written
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Follower for a growing text file, in the manner of `tail -f`
///
/// Waits for the file to appear, starts at its current end and hands every
/// complete line appended afterwards to a callback. Between polls the tailer
/// sleeps instead of spinning. The file handle is held for the lifetime of
/// [`LogTailer::run`]: truncation in place is followed, but a rename-based
/// rotation leaves the tailer on the old file. Runs until
/// [`LogTailer::stop`] is called or an I/O error occurs.
#[derive(Debug)]
pub struct LogTailer {
    /// File to follow
    path: PathBuf,
    /// Sleep when no new data is available
    poll_interval: Duration,
    /// Sleep between checks while the file does not exist
    source_wait: Duration,
    /// Lines longer than this are dropped
    max_line_bytes: usize,
    /// Cleared to ask the loop to return
    running: Arc<AtomicBool>,
}

impl LogTailer {
    /// Create a new tailer
    ///
    /// # Arguments
    ///
    /// * `path` - File to follow
    /// * `poll_interval` - Delay before re-reading after hitting end of file
    /// * `source_wait` - Delay between existence checks before the file appears
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration, source_wait: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            source_wait,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Set the longest line that is passed on; longer ones are logged and dropped
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle that stops the tailer when set to `false`, e.g. from a signal handler
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Follow the file, calling `on_line` for each complete appended line
    ///
    /// Lines are passed as raw bytes without their trailing line terminator;
    /// decoding is left to the caller. Content that existed before the file
    /// was opened is skipped.
    ///
    /// After every idle poll the tailer checks for in-place truncation
    /// (logrotate `copytruncate`): either the file is now shorter than the
    /// read offset, or the byte just before the offset no longer matches the
    /// last byte consumed. Both restart reading from the start of the file.
    /// A truncation whose refill happens to leave the same byte at that
    /// position, or one that lands while lines are still being consumed,
    /// goes unnoticed and the tailer resumes mid-file.
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::IoError` if the file cannot be opened once it
    /// exists, or if reading from it fails.
    pub fn run<F>(&self, mut on_line: F) -> Result<(), CollectorError>
    where
        F: FnMut(&[u8]),
    {
        let Some(file) = self.wait_for_source()? else {
            return Ok(());
        };

        let mut reader = BufReader::new(file);
        let mut offset = reader.seek(SeekFrom::End(0))?;
        let mut last_byte = byte_before(&mut reader, offset)?;
        info!("Tailing {} from offset {}", self.path.display(), offset);

        let mut pending: Vec<u8> = Vec::new();
        let mut chunk: Vec<u8> = Vec::new();
        // Set while skipping the rest of an oversized line
        let mut discarding = false;

        while self.is_running() {
            chunk.clear();
            let read = reader.read_until(b'\n', &mut chunk)?;

            if read == 0 {
                self.sleep_while_running(self.poll_interval);
                if self.was_truncated(&mut reader, offset, last_byte)? {
                    offset = reader.seek(SeekFrom::Start(0))?;
                    last_byte = None;
                    pending.clear();
                    discarding = false;
                }
                continue;
            }

            offset += read as u64;
            last_byte = chunk.last().copied();
            let complete = last_byte == Some(b'\n');

            if discarding {
                discarding = !complete;
                continue;
            }

            pending.extend_from_slice(&chunk);
            if pending.len() > self.max_line_bytes {
                warn!(
                    "Dropping line longer than {} bytes in {}",
                    self.max_line_bytes,
                    self.path.display()
                );
                pending.clear();
                discarding = !complete;
                continue;
            }

            // Hold partial writes until their newline arrives
            if !complete {
                continue;
            }

            on_line(trim_line_end(&pending));
            pending.clear();
        }

        debug!("Stopped tailing {}", self.path.display());
        Ok(())
    }

    /// Check whether the file was truncated underneath the current offset
    ///
    /// Leaves the reader positioned at `offset` when returning `false`.
    fn was_truncated(
        &self,
        reader: &mut BufReader<File>,
        offset: u64,
        last_byte: Option<u8>,
    ) -> Result<bool, CollectorError> {
        let len = reader.get_ref().metadata()?.len();
        if len < offset {
            warn!(
                "{} shrank from {} to {} bytes, reading from the start",
                self.path.display(),
                offset,
                len
            );
            return Ok(true);
        }

        if last_byte.is_some() {
            let current = byte_before(reader, offset)?;
            if current != last_byte {
                warn!(
                    "{} was rewritten before offset {}, reading from the start",
                    self.path.display(),
                    offset
                );
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Block until the file exists and can be opened
    ///
    /// Returns `Ok(None)` if the tailer was stopped while waiting.
    fn wait_for_source(&self) -> Result<Option<File>, CollectorError> {
        while self.is_running() {
            if self.path.exists() {
                return Ok(Some(File::open(&self.path)?));
            }
            info!(
                "Waiting for {} to appear (retrying in {:?})",
                self.path.display(),
                self.source_wait
            );
            self.sleep_while_running(self.source_wait);
        }
        Ok(None)
    }

    /// Sleep in short slices so that shutdown stays responsive
    fn sleep_while_running(&self, duration: Duration) {
        let mut remaining = duration;
        while remaining > Duration::ZERO && self.is_running() {
            let sleep_time = std::cmp::min(remaining, SLEEP_SLICE);
            thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }
}

/// Read the byte at `offset - 1`, leaving the reader positioned at `offset`
fn byte_before(reader: &mut BufReader<File>, offset: u64) -> Result<Option<u8>, CollectorError> {
    if offset == 0 {
        return Ok(None);
    }
    reader.seek(SeekFrom::Start(offset - 1))?;
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Ok(Some(byte[0]))
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::mpsc;
    use std::time::Instant;
    use tempfile::TempDir;

    const POLL: Duration = Duration::from_millis(10);

    type TailerHandle = (
        Arc<AtomicBool>,
        mpsc::Receiver<Vec<u8>>,
        thread::JoinHandle<Result<(), CollectorError>>,
    );

    /// Run a tailer on a background thread, forwarding raw lines to a channel
    fn spawn_configured(tailer: LogTailer) -> TailerHandle {
        let running = tailer.running_flag();
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            tailer.run(|line| {
                let _ = tx.send(line.to_vec());
            })
        });
        (running, rx, handle)
    }

    fn spawn_tailer(path: PathBuf) -> TailerHandle {
        spawn_configured(LogTailer::new(path, POLL, POLL))
    }

    fn recv_line(rx: &mpsc::Receiver<Vec<u8>>) -> String {
        let line = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        String::from_utf8(line).unwrap()
    }

    fn append(path: &Path, data: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(data.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    /// Keep appending a marker line until the tailer reports it, proving it reached EOF
    fn sync_with_tailer(path: &Path, rx: &mpsc::Receiver<Vec<u8>>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            append(path, "sync\n");
            if let Ok(line) = rx.recv_timeout(Duration::from_millis(50)) {
                assert_eq!(line, b"sync");
                while rx.recv_timeout(Duration::from_millis(50)).is_ok() {}
                return;
            }
        }
        panic!("tailer never picked up appended lines");
    }

    #[test]
    fn test_tailer_creation() {
        let tailer = LogTailer::new("/var/log/nginx/access.log", POLL, POLL);
        assert!(tailer.is_running());
        assert_eq!(tailer.path(), Path::new("/var/log/nginx/access.log"));
        tailer.stop();
        assert!(!tailer.is_running());
    }

    #[test]
    fn test_skips_existing_content_and_follows_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "old line 1\nold line 2\n");

        let (running, rx, handle) = spawn_tailer(path.clone());
        sync_with_tailer(&path, &rx);

        append(&path, "first\nsecond\r\n");
        assert_eq!(recv_line(&rx), "first");
        assert_eq!(recv_line(&rx), "second");

        running.store(false, Ordering::SeqCst);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_waits_for_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.log");

        let (running, rx, handle) = spawn_tailer(path.clone());
        thread::sleep(Duration::from_millis(50));
        assert!(rx.try_recv().is_err());

        sync_with_tailer(&path, &rx);
        append(&path, "hello\n");
        assert_eq!(recv_line(&rx), "hello");

        running.store(false, Ordering::SeqCst);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_partial_line_is_held_until_complete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "");

        let (running, rx, handle) = spawn_tailer(path.clone());
        sync_with_tailer(&path, &rx);

        append(&path, r#"{"pool":"bl"#);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        append(&path, "ue\"}\n");
        assert_eq!(recv_line(&rx), r#"{"pool":"blue"}"#);

        running.store(false, Ordering::SeqCst);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_truncation_restarts_from_beginning() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        append(&path, &"x".repeat(4096));
        append(&path, "\n");

        let (running, rx, handle) = spawn_tailer(path.clone());
        sync_with_tailer(&path, &rx);

        // copytruncate-style rotation
        std::fs::write(&path, "after rotation\n").unwrap();
        assert_eq!(recv_line(&rx), "after rotation");

        running.store(false, Ordering::SeqCst);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_truncate_and_refill_between_polls_restarts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "");

        let tailer = LogTailer::new(&path, Duration::from_millis(400), POLL);
        let (running, rx, handle) = spawn_configured(tailer);
        sync_with_tailer(&path, &rx);

        // Refill past the old offset before the tailer's next poll. Every record
        // line is 38 bytes, so the byte before an offset made of 5-byte sync
        // lines is never the newline the tailer last consumed.
        let records: Vec<String> = ["500", "501", "502"]
            .iter()
            .map(|status| format!(r#"{{"pool":"green","status":"{}","t":1}}"#, status))
            .collect();
        assert!(records.iter().all(|r| r.len() + 1 == 38));
        std::fs::write(&path, records.join("\n") + "\n").unwrap();

        for record in &records {
            assert_eq!(&recv_line(&rx), record);
        }

        running.store(false, Ordering::SeqCst);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_oversized_line_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "");

        let tailer = LogTailer::new(&path, POLL, POLL).with_max_line_bytes(32);
        let (running, rx, handle) = spawn_configured(tailer);
        sync_with_tailer(&path, &rx);

        // A writer that never ends its line, then finally does
        append(&path, &"x".repeat(40));
        thread::sleep(Duration::from_millis(50));
        append(&path, &"y".repeat(40));
        append(&path, "\n");
        append(&path, &"z".repeat(64));
        append(&path, "\nok\n");

        assert_eq!(recv_line(&rx), "ok");

        running.store(false, Ordering::SeqCst);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_lines_are_passed_as_raw_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        append(&path, "");

        let (running, rx, handle) = spawn_tailer(path.clone());
        sync_with_tailer(&path, &rx);

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"pool\":\"bl\xffue\"}\r\n").unwrap();
        file.flush().unwrap();

        let line = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(line, b"{\"pool\":\"bl\xffue\"}".to_vec());

        running.store(false, Ordering::SeqCst);
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_trim_line_end() {
        assert_eq!(trim_line_end(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_end(b"abc\n"), b"abc");
        assert_eq!(trim_line_end(b"\n"), b"");
        assert_eq!(trim_line_end(b"abc"), b"abc");
    }

    #[test]
    fn test_stop_while_waiting_for_source() {
        let dir = TempDir::new().unwrap();
        let tailer = LogTailer::new(dir.path().join("never.log"), POLL, POLL);
        tailer.stop();

        let mut lines = 0;
        assert!(tailer.run(|_| lines += 1).is_ok());
        assert_eq!(lines, 0);
    }

    #[test]
    #[cfg(unix)]
    fn test_unreadable_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        // A directory exists but cannot be tailed as a file
        let tailer = LogTailer::new(dir.path(), POLL, POLL);
        let result = tailer.run(|_| {});
        assert!(matches!(result, Err(CollectorError::IoError(_))));
    }
}
