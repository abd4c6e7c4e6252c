//! The store file: a stream of JSON documents, each an event carrying an
//! RFC 6902 patch. Replaying all patches onto `{}` yields the store.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::{de::IoRead, Deserializer, StreamDeserializer, Value};
use std::{
    fs::{File, OpenOptions},
    io::{self, Seek as _, Write},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

pub const STORE_TYPE: &str = "externalServerStore";

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct StoreEvent {
    pub index: u64,
    pub meta: StoreEventMeta,
    pub patch: json_patch::Patch,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct StoreEventMeta {
    pub time: String,
    #[serde(flatten)]
    pub other_fields: Value,
}

impl StoreEvent {
    pub fn new(index: u64, event: &str, patch: json_patch::Patch) -> Self {
        StoreEvent {
            index,
            meta: StoreEventMeta {
                time: Utc::now().to_rfc3339(),
                other_fields: serde_json::json!({ "event": event }),
            },
            patch,
        }
    }

    fn init() -> Self {
        StoreEvent::new(
            0,
            "init",
            json_patch::Patch(vec![json_patch::PatchOperation::Add(
                json_patch::AddOperation {
                    path: Default::default(),
                    value: serde_json::json!({
                        "_type": STORE_TYPE,
                        "servers": {},
                    }),
                },
            )]),
        )
    }
}

pub struct StoreEventStream<'a, R: io::Read> {
    iter: StreamDeserializer<'a, IoRead<R>, StoreEvent>,
    /// The validated first event, handed out before the rest
    first_event: Option<StoreEvent>,
}

impl<'a, R: io::Read> StoreEventStream<'a, R> {
    pub fn open_from_reader(reader: R) -> Result<StoreEventStream<'a, R>> {
        let mut iter = Deserializer::from_reader(reader).into_iter();
        let first_event = match iter.next() {
            Some(Ok(ev @ StoreEvent { index: 0, .. })) => ev,
            Some(Ok(StoreEvent { index, .. })) => {
                bail!("Expected initial store event with index 0, got {}", index)
            }
            Some(Err(e)) => bail!("Store file invalid: error parsing initial event: {}", e),
            None => bail!("Store file invalid: no initial event"),
        };
        Ok(StoreEventStream {
            iter,
            first_event: Some(first_event),
        })
    }
}

impl<'a, R: io::Read> Iterator for StoreEventStream<'a, R> {
    type Item = Result<StoreEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.first_event.take() {
            Some(first) => Some(Ok(first)),
            None => self.iter.next().map(|r| r.map_err(Into::into)),
        }
    }
}

/// Replay `events` onto `state`. Answers the number of events applied.
pub fn apply_store_events(
    state: &mut Value,
    events: impl Iterator<Item = Result<StoreEvent>>,
) -> Result<u64> {
    let mut count = 0;
    for event in events {
        let event = event?;
        json_patch::patch(state, event.patch.0.as_slice())
            .with_context(|| format!("Could not apply store event {}", event.index))?;
        count += 1;
    }
    Ok(count)
}

/// Read the whole store file. Answers the store and its event count.
pub fn load<P: AsRef<Path>>(path: P) -> Result<(Value, u64)> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Could not open store file {}", path.display()))?;
    let stream = StoreEventStream::open_from_reader(io::BufReader::new(file))?;
    let mut store = serde_json::json!({});
    let count = apply_store_events(&mut store, stream)?;
    match store.get("_type").and_then(Value::as_str) {
        Some(STORE_TYPE) => Ok((store, count)),
        other => bail!(
            "{} is not an external server store (_type: {:?})",
            path.display(),
            other
        ),
    }
}

/// Reports a wait that takes a while.
/// After SILENT_INTERVAL: log the activity
/// After each further LOG_INTERVAL: log the activity and how long it has been
pub struct WaitMonitor {
    done: Arc<AtomicBool>,
}

impl WaitMonitor {
    const SILENT_INTERVAL: Duration = Duration::from_millis(500);
    const LOG_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(activity: &'static str) -> WaitMonitor {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        std::thread::spawn(move || WaitMonitor::run(flag, activity));
        WaitMonitor { done }
    }

    fn run(done: Arc<AtomicBool>, activity: &'static str) {
        let start = Instant::now();
        let mut next_log = start + Self::SILENT_INTERVAL;
        loop {
            std::thread::sleep(next_log.saturating_duration_since(Instant::now()));
            if done.load(Ordering::Relaxed) {
                break;
            }
            let waited = next_log.duration_since(start);
            if waited <= Self::SILENT_INTERVAL {
                tracing::info!("{}", activity);
            } else {
                tracing::warn!(seconds = waited.as_secs(), "{}", activity);
            }
            next_log += Self::LOG_INTERVAL;
        }
    }

    pub fn done(&self) {
        self.done.store(true, Ordering::Relaxed);
    }
}

impl Drop for WaitMonitor {
    fn drop(&mut self) {
        self.done()
    }
}

/// Appends events to a store file under an exclusive lock.
pub struct StoreHandle {
    file: Arc<File>,
    locking: fd_lock::RwLock<Arc<File>>,
    expected_size: Option<u64>,
}

impl StoreHandle {
    /// Open an existing store, or create a new one holding only the initial event.
    pub fn open<P: AsRef<Path>>(path: P, create_new: bool) -> Result<StoreHandle> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create_new(create_new)
            .open(path)
            .with_context(|| format!("Could not open store file {}", path.display()))?;
        let file = Arc::new(file);
        let mut handle = StoreHandle {
            locking: fd_lock::RwLock::new(file.clone()),
            file,
            expected_size: None,
        };
        if create_new {
            handle.append(&[&StoreEvent::init()])?;
        }
        Ok(handle)
    }

    fn lock_write(
        locking: &mut fd_lock::RwLock<Arc<File>>,
    ) -> Result<fd_lock::RwLockWriteGuard<'_, Arc<File>>> {
        let monitor = WaitMonitor::new("Waiting for store file write lock");
        let lock = locking.write()?;
        monitor.done();
        Ok(lock)
    }

    pub fn append(&mut self, events: &[&StoreEvent]) -> Result<()> {
        let lock_guard = Self::lock_write(&mut self.locking)?;
        let pos = self.file.seek(io::SeekFrom::End(0))?;
        match self.expected_size {
            Some(expected_size) if pos != expected_size => {
                tracing::error!(
                    expected_size,
                    actual_size = pos,
                    "store file was written concurrently; it may need manual repair"
                );
            }
            _ => {}
        }
        let mut writer = io::BufWriter::new(self.file.clone());
        for event in events {
            serde_json::to_writer_pretty(&mut writer, event)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        drop(writer);
        self.expected_size = Some(self.file.stream_position()?);
        drop(lock_guard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_EXAMPLE: &str = r#"
    {
        "index": 0,
        "meta": {"time": "2024-05-02T10:00:00Z", "event": "init"},
        "patch": [
            {"op": "add", "path": "", "value": {"_type": "externalServerStore", "servers": {}}}
        ]
    }
    {
        "index": 1,
        "meta": {"time": "2024-05-02T10:01:00Z", "event": "create"},
        "patch": [
            {"op": "add", "path": "/servers/relay", "value": {"type": "smtp", "id": "relay", "server-host-name": "mail"}}
        ]
    }
    {
        "index": 2,
        "meta": {"time": "2024-05-02T10:02:00Z", "event": "update"},
        "patch": [
            {"op": "replace", "path": "/servers/relay/server-host-name", "value": "mail2"}
        ]
    }
"#;

    #[test]
    fn test_replay() {
        let stream = StoreEventStream::open_from_reader(BASIC_EXAMPLE.as_bytes()).unwrap();
        let mut store = serde_json::json!({});
        assert_eq!(apply_store_events(&mut store, stream).unwrap(), 3);
        assert_eq!(
            store,
            serde_json::json!({
                "_type": "externalServerStore",
                "servers": {
                    "relay": {"type": "smtp", "id": "relay", "server-host-name": "mail2"}
                }
            })
        );
    }

    #[test]
    fn test_first_event_must_be_index_zero() {
        let input = r#"{"index":1,"meta":{"time":"2024-05-02T10:00:00Z"},"patch":[]}"#;
        assert!(StoreEventStream::open_from_reader(input.as_bytes()).is_err());
    }

    #[test]
    fn test_invalid_first_events() {
        for input in [
            "",
            "[]",
            r#"{"meta":{"time":"2024-05-02T10:00:00Z"},"patch":[]}"#,
            r#"{"index":0,"meta":{"time":"2024-05-02T10:00:00Z"}}"#,
            r#"{"index":0,"patch":[{}]}"#,
            r#"{"index":0,"meta":{"time":"2024-05-02T10:00:00Z"},"patch":[]"#,
        ] {
            assert!(
                StoreEventStream::open_from_reader(input.as_bytes()).is_err(),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_invalid_later_event_surfaces() {
        let input = r#"{"index":0,"meta":{"time":"2024-05-02T10:00:00Z"},"patch":[]}
{"meta":{"time":"2024-05-02T10:00:00Z"}}"#;
        let events: Vec<Result<StoreEvent>> = StoreEventStream::open_from_reader(input.as_bytes())
            .unwrap()
            .collect();
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
    }

    #[test]
    fn test_create_append_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut handle = StoreHandle::open(&path, true).unwrap();
        handle
            .append(&[&StoreEvent::new(
                1,
                "create",
                json_patch::Patch(vec![json_patch::PatchOperation::Add(
                    json_patch::AddOperation {
                        path: "/servers/relay".parse().unwrap(),
                        value: serde_json::json!({"type": "smtp", "id": "relay"}),
                    },
                )]),
            )])
            .unwrap();
        let (store, count) = load(&path).unwrap();
        assert_eq!(count, 2);
        assert_eq!(store["servers"]["relay"]["type"], "smtp");

        // an existing file is never recreated
        assert!(StoreHandle::open(&path, true).is_err());
    }

    #[test]
    fn test_load_rejects_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"index":0,"meta":{"time":"2024-05-02T10:00:00Z"},"patch":[{"op":"add","path":"","value":{"_type":"otherState"}}]}"#,
        )
        .unwrap();
        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("not an external server store"));
    }
}
