//! Background persistence. All plugin state shares one host blob, so
//! every save is a read-modify-write of the whole object; funneling
//! them through a single writer thread keeps those writes serialized
//! and guarantees the newest in-memory snapshot is what lands on disk.

use flume::{Receiver, Sender};
use log::error;
use serde_json::Value;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::storage::HostStorage;

enum Request {
    /// Replace the blob entry under `key` with `payload`.
    Write { key: String, payload: Value },
    /// Reply once everything queued before this point has been written.
    Flush(Sender<()>),
}

/// Handle to the writer thread. Mutating components submit snapshots
/// of their own blob key and move on; the thread batches whatever has
/// queued up and keeps only the newest payload per key.
///
/// Dropping the writer drains the remaining queue, then joins the
/// thread, so scheduled writes survive an orderly shutdown.
pub struct PersistWriter {
    tx: Option<Sender<Request>>,
    handle: Option<JoinHandle<()>>,
}

impl PersistWriter {
    pub fn spawn(storage: Arc<dyn HostStorage>) -> Self {
        let (tx, rx) = flume::unbounded();
        let handle = std::thread::spawn(move || run_writer(storage.as_ref(), &rx));
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Queues a snapshot for `key`. Never blocks and never fails from
    /// the caller's perspective; storage errors are logged by the
    /// writer thread.
    pub fn submit(&self, key: &str, payload: Value) {
        let request = Request::Write {
            key: key.to_string(),
            payload,
        };
        if let Some(tx) = &self.tx {
            if tx.send(request).is_ok() {
                return;
            }
        }
        error!("Persist writer is gone, dropping write for `{key}`");
    }

    /// Blocks until every write submitted so far has been attempted.
    pub fn flush(&self) {
        let Some(tx) = &self.tx else { return };
        let (done_tx, done_rx) = flume::bounded(1);
        if tx.send(Request::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

impl Drop for PersistWriter {
    fn drop(&mut self) {
        // Disconnecting lets the thread drain queued requests and exit.
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_writer(storage: &dyn HostStorage, rx: &Receiver<Request>) {
    while let Ok(first) = rx.recv() {
        let mut pending: Vec<(String, Value)> = Vec::new();
        let mut flushes: Vec<Sender<()>> = Vec::new();
        enqueue(first, &mut pending, &mut flushes);

        // Coalesce the burst behind this request; only the newest
        // snapshot per key needs to reach storage.
        while let Ok(next) = rx.try_recv() {
            enqueue(next, &mut pending, &mut flushes);
        }

        if !pending.is_empty() {
            if let Err(e) = write_batch(storage, pending) {
                error!("Failed to persist plugin data: {e:#}");
            }
        }
        for done in flushes {
            let _ = done.send(());
        }
    }
}

fn enqueue(request: Request, pending: &mut Vec<(String, Value)>, flushes: &mut Vec<Sender<()>>) {
    match request {
        Request::Write { key, payload } => {
            if let Some(slot) = pending.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = payload;
            } else {
                pending.push((key, payload));
            }
        }
        Request::Flush(done) => flushes.push(done),
    }
}

fn write_batch(storage: &dyn HostStorage, pending: Vec<(String, Value)>) -> anyhow::Result<()> {
    // Read-modify-write of the shared blob: sibling keys owned by the
    // host or other features must survive.
    let mut blob = match storage.load_data()? {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    for (key, payload) in pending {
        blob.insert(key, payload);
    }
    storage.save_data(&Value::Object(blob))
}
