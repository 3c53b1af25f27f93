//! In-memory remote store used by the integration tests.

#![allow(dead_code)]

use archive_mirror::archive::VolumeFile;
use archive_mirror::remote::{Connector, RemoteSession, TransportError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Scripted result for the next `store` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Transient,
    Permanent,
    /// Store succeeds but one byte short, so verification fails
    Truncate,
}

#[derive(Debug, Default)]
pub struct RemoteState {
    pub dirs: BTreeSet<String>,
    /// Absolute file path → size
    pub files: BTreeMap<String, u64>,
    pub store_calls: Vec<String>,
    pub deletes: Vec<String>,
    pub connects: usize,
    pub store_faults: VecDeque<Fault>,
    pub failing_deletes: BTreeSet<String>,
    pub failing_connects: usize,
    pub failing_mkdirs: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    pub state: Arc<Mutex<RemoteState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.state.lock().unwrap().dirs.insert("/".to_string());
        store
    }

    /// Create `dir` (and its parents) remotely.
    pub fn with_dir(self, dir: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let mut path = String::new();
            for segment in dir.split('/').filter(|s| !s.is_empty()) {
                path.push('/');
                path.push_str(segment);
                state.dirs.insert(path.clone());
            }
        }
        self
    }

    pub fn put(&self, dir: &str, name: &str, size: u64) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(format!("{}/{}", dir, name), size);
    }

    pub fn fail_stores(&self, faults: &[Fault]) {
        self.state.lock().unwrap().store_faults.extend(faults.iter().copied());
    }

    /// Names of the files directly inside `dir`.
    pub fn names(&self, dir: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        list_dir(&state, dir)
    }

    pub fn store_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().store_calls.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }
}

fn list_dir(state: &RemoteState, dir: &str) -> Vec<String> {
    let prefix = if dir == "/" { "/".to_string() } else { format!("{}/", dir) };
    state
        .files
        .keys()
        .filter_map(|path| path.strip_prefix(&prefix))
        .filter(|rest| !rest.contains('/'))
        .map(String::from)
        .collect()
}

fn resolve(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", cwd, path)
    };
    let segments: Vec<&str> = joined.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    format!("/{}", segments.join("/"))
}

#[async_trait]
impl Connector for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn RemoteSession>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(TransportError::Transient("connection refused".into()));
        }
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
            cwd: "/".to_string(),
        }))
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

pub struct MemorySession {
    state: Arc<Mutex<RemoteState>>,
    cwd: String,
}

impl MemorySession {
    fn file_path(&self, name: &str) -> String {
        resolve(&self.cwd, name)
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    async fn change_dir(&mut self, path: &str) -> Result<(), TransportError> {
        let target = resolve(&self.cwd, path);
        if self.state.lock().unwrap().dirs.contains(&target) {
            self.cwd = target;
            Ok(())
        } else {
            Err(TransportError::NotFound(target))
        }
    }

    async fn make_dir(&mut self, path: &str) -> Result<(), TransportError> {
        let target = resolve(&self.cwd, path);
        let parent = match target.rsplit_once('/') {
            Some(("", _)) | None => "/".to_string(),
            Some((parent, _)) => parent.to_string(),
        };
        let mut state = self.state.lock().unwrap();
        if state.failing_mkdirs {
            return Err(TransportError::Permanent(format!("550 {}: permission denied", target)));
        }
        if !state.dirs.contains(&parent) {
            return Err(TransportError::NotFound(parent));
        }
        state.dirs.insert(target);
        Ok(())
    }

    async fn current_dir(&mut self) -> Result<String, TransportError> {
        Ok(self.cwd.clone())
    }

    async fn list_names(&mut self) -> Result<Vec<String>, TransportError> {
        let state = self.state.lock().unwrap();
        Ok(list_dir(&state, &self.cwd))
    }

    async fn store(&mut self, remote_name: &str, local: &Path) -> Result<u64, TransportError> {
        let size = std::fs::metadata(local)?.len();
        let path = self.file_path(remote_name);
        let mut state = self.state.lock().unwrap();
        state.store_calls.push(remote_name.to_string());

        let stored = match state.store_faults.pop_front() {
            Some(Fault::Transient) => return Err(TransportError::Transient("421 timeout".into())),
            Some(Fault::Permanent) => return Err(TransportError::Permanent("553 not allowed".into())),
            Some(Fault::Truncate) => size.saturating_sub(1),
            None => size,
        };
        state.files.insert(path, stored);
        Ok(stored)
    }

    async fn size(&mut self, remote_name: &str) -> Result<u64, TransportError> {
        let path = self.file_path(remote_name);
        self.state
            .lock()
            .unwrap()
            .files
            .get(&path)
            .copied()
            .ok_or(TransportError::NotFound(path))
    }

    async fn delete(&mut self, remote_name: &str) -> Result<(), TransportError> {
        let path = self.file_path(remote_name);
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(remote_name) {
            return Err(TransportError::Permanent(format!("550 cannot delete {}", remote_name)));
        }
        state.deletes.push(remote_name.to_string());
        state
            .files
            .remove(&path)
            .map(|_| ())
            .ok_or(TransportError::NotFound(path))
    }

    async fn quit(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Write a local volume file and describe it.
pub fn local_volume(dir: &Path, name: &str, contents: &[u8]) -> VolumeFile {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    VolumeFile {
        path,
        name: name.to_string(),
        size: contents.len() as u64,
        volume: archive_mirror::archive::volume_number(name),
    }
}
