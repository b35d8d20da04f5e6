//! Test support: an in-memory recording backend
//!
//! Stands in for the real device session in unit and integration tests.
//! Records every call in order, stages edits until commit, and can be
//! scripted to fail the next commit.

use crate::backend::{BackendTransaction, DeviceBackend, EditRequest, RpcOutcome};
use async_trait::async_trait;
use fleetlink_common::{AccessMode, Datastore, Path, Payload};
use fleetlink_protocol::BackendError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One call observed by the recording backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    NewTransaction,
    Read(Path),
    Exists(Path),
    Edit(&'static str, Path),
    Lock,
    Unlock,
    Rpc(Path),
    Commit,
    Cancel,
}

struct Inner {
    calls: Mutex<Vec<BackendCall>>,
    committed: Mutex<HashMap<String, Payload>>,
    fail_commit: Mutex<Option<BackendError>>,
    commit_count: AtomicUsize,
}

/// Recording device backend
#[derive(Clone)]
pub struct RecordingBackend {
    inner: Arc<Inner>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                calls: Mutex::new(Vec::new()),
                committed: Mutex::new(HashMap::new()),
                fail_commit: Mutex::new(None),
                commit_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Make the next commit fail with the given cause
    pub fn fail_next_commit(&self, message: impl Into<String>) {
        *self.inner.fail_commit.lock() = Some(BackendError::new(message));
    }

    /// All calls observed so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.calls.lock().clone()
    }

    /// How many commits reached the backend
    pub fn commit_count(&self) -> usize {
        self.inner.commit_count.load(Ordering::SeqCst)
    }

    /// Committed value under a path, if any
    pub fn committed_value(&self, path: &Path) -> Option<Payload> {
        self.inner.committed.lock().get(path.as_str()).cloned()
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceBackend for RecordingBackend {
    async fn new_transaction(
        &self,
        _access: AccessMode,
    ) -> Result<Box<dyn BackendTransaction>, BackendError> {
        self.inner.calls.lock().push(BackendCall::NewTransaction);
        Ok(Box::new(RecordingTransaction {
            inner: self.inner.clone(),
            staged: Vec::new(),
        }))
    }
}

struct RecordingTransaction {
    inner: Arc<Inner>,
    /// Edits staged until commit; `None` marks a deletion
    staged: Vec<(String, Option<Payload>)>,
}

impl RecordingTransaction {
    fn record(&self, call: BackendCall) {
        self.inner.calls.lock().push(call);
    }

    /// Staged view over committed data
    fn lookup(&self, path: &Path) -> Option<Payload> {
        for (staged_path, value) in self.staged.iter().rev() {
            if staged_path == path.as_str() {
                return value.clone();
            }
        }
        self.inner.committed.lock().get(path.as_str()).cloned()
    }
}

#[async_trait]
impl BackendTransaction for RecordingTransaction {
    async fn read(
        &mut self,
        _store: Datastore,
        path: &Path,
        _fields: Option<&[Path]>,
    ) -> Result<Option<Payload>, BackendError> {
        self.record(BackendCall::Read(path.clone()));
        Ok(self.lookup(path))
    }

    async fn exists(&mut self, _store: Datastore, path: &Path) -> Result<bool, BackendError> {
        self.record(BackendCall::Exists(path.clone()));
        Ok(self.lookup(path).is_some())
    }

    async fn edit(&mut self, edit: EditRequest) -> Result<(), BackendError> {
        self.record(BackendCall::Edit(edit.kind(), edit.path().clone()));

        match edit {
            EditRequest::Put {
                path, payload, ..
            }
            | EditRequest::Merge {
                path, payload, ..
            }
            | EditRequest::Replace {
                path, payload, ..
            } => {
                self.staged.push((path.as_str().to_string(), Some(payload)));
            }
            EditRequest::Create { path, payload, .. } => {
                if self.lookup(&path).is_some() {
                    return Err(BackendError::new(format!("data exists at {}", path)));
                }
                self.staged.push((path.as_str().to_string(), Some(payload)));
            }
            EditRequest::Delete { path, .. } => {
                if self.lookup(&path).is_none() {
                    return Err(BackendError::new(format!("no data at {}", path)));
                }
                self.staged.push((path.as_str().to_string(), None));
            }
            EditRequest::Remove { path, .. } => {
                self.staged.push((path.as_str().to_string(), None));
            }
        }
        Ok(())
    }

    async fn lock(&mut self) -> Result<(), BackendError> {
        self.record(BackendCall::Lock);
        Ok(())
    }

    async fn unlock(&mut self) -> Result<(), BackendError> {
        self.record(BackendCall::Unlock);
        Ok(())
    }

    async fn invoke_rpc(
        &mut self,
        schema_path: &Path,
        input: Option<&Payload>,
    ) -> Result<RpcOutcome, BackendError> {
        self.record(BackendCall::Rpc(schema_path.clone()));
        Ok(RpcOutcome {
            output: input.cloned(),
            errors: Vec::new(),
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), BackendError> {
        self.record(BackendCall::Commit);

        if let Some(cause) = self.inner.fail_commit.lock().take() {
            return Err(cause);
        }

        let mut committed = self.inner.committed.lock();
        for (path, value) in self.staged.iter() {
            match value {
                Some(payload) => {
                    committed.insert(path.clone(), payload.clone());
                }
                None => {
                    committed.remove(path);
                }
            }
        }
        drop(committed);

        self.inner.commit_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn cancel(self: Box<Self>) -> bool {
        self.record(BackendCall::Cancel);
        true
    }
}
