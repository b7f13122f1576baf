// Test doubles shared by the integration tests
//
// MemoryStore counts every store round trip and can be told to fail, to
// slow down `put` or to hold `remove` calls until released.

#![allow(dead_code)]

use chrono::Utc;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use voice_vault::{CaptureDevice, CaptureEvent, ObjectStore, PermissionError, StoreError, StoredObject};

#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, i64)>>,
    pub puts: AtomicUsize,
    pub removes: AtomicUsize,
    pub url_requests: AtomicUsize,
    pub fail_put: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_remove: AtomicBool,
    fail_url_for: Mutex<HashSet<String>>,
    remove_gate: Mutex<Option<Arc<Semaphore>>>,
    put_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed an object as if it had been written at `last_modified_ms`
    pub fn insert(&self, key: &str, size: usize, last_modified_ms: i64) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (vec![0u8; size], last_modified_ms));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|(data, _)| data.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn fail_signed_url_for(&self, key: &str) {
        self.fail_url_for.lock().unwrap().insert(key.to_string());
    }

    /// Make every `put` take `delay` before the object lands
    pub fn slow_puts(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    /// Make `remove` wait until permits are added to the returned semaphore
    pub fn hold_removes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.remove_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self) -> Result<Vec<StoredObject>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("list disabled".to_string()));
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|(key, (data, modified))| StoredObject {
                key: key.clone(),
                size: data.len() as u64,
                last_modified_ms: *modified,
            })
            .collect())
    }

    async fn signed_url(&self, key: &str) -> Result<String, StoreError> {
        self.url_requests.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_url_for.lock().unwrap().contains(key) {
            return Err(StoreError::Unavailable(format!("no URL for {}", key)));
        }
        Ok(format!("https://store.test/{}?sig=abc", key))
    }

    async fn put(
        &self,
        key: &str,
        blob: Vec<u8>,
        _content_type: &str,
    ) -> Result<StoredObject, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::QuotaExceeded);
        }
        let modified = Utc::now().timestamp_millis();
        let size = blob.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (blob, modified));
        Ok(StoredObject {
            key: key.to_string(),
            size,
            last_modified_ms: modified,
        })
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        let gate = self.remove_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("remove disabled".to_string()));
        }
        match self.objects.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Capture device that plays a fixed script
///
/// `live` fragments are queued on open; `tail` fragments are delivered after
/// `close()`, followed by `Stopped`, like a recorder flushing its buffer.
pub struct ScriptedCapture {
    live: VecDeque<Vec<u8>>,
    tail: VecDeque<Vec<u8>>,
    stop_on_open: bool,
    close_delay: Option<Duration>,
    tx: Option<mpsc::Sender<CaptureEvent>>,
}

impl ScriptedCapture {
    pub fn new(live: &[&str], tail: &[&str]) -> Box<Self> {
        Box::new(Self {
            live: live.iter().map(|f| f.as_bytes().to_vec()).collect(),
            tail: tail.iter().map(|f| f.as_bytes().to_vec()).collect(),
            stop_on_open: false,
            close_delay: None,
            tx: None,
        })
    }

    /// The device stops by itself after the live fragments
    pub fn self_stopping(live: &[&str]) -> Box<Self> {
        let mut device = Self::new(live, &[]);
        device.stop_on_open = true;
        device
    }

    /// `close()` takes `delay` before the tail and `Stopped` are delivered
    pub fn slow_close(mut self: Box<Self>, delay: Duration) -> Box<Self> {
        self.close_delay = Some(delay);
        self
    }
}

#[async_trait::async_trait]
impl CaptureDevice for ScriptedCapture {
    async fn open(&mut self) -> Result<mpsc::Receiver<CaptureEvent>, PermissionError> {
        let (tx, rx) = mpsc::channel(64);
        while let Some(fragment) = self.live.pop_front() {
            tx.send(CaptureEvent::Fragment(fragment)).await.unwrap();
        }
        if self.stop_on_open {
            tx.send(CaptureEvent::Stopped).await.unwrap();
        }
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(tx) = self.tx.take() {
            while let Some(fragment) = self.tail.pop_front() {
                let _ = tx.send(CaptureEvent::Fragment(fragment)).await;
            }
            let _ = tx.send(CaptureEvent::Stopped).await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Device whose permission request is always refused
pub struct DeniedCapture;

#[async_trait::async_trait]
impl CaptureDevice for DeniedCapture {
    async fn open(&mut self) -> Result<mpsc::Receiver<CaptureEvent>, PermissionError> {
        Err(PermissionError::Denied("user dismissed the prompt".to_string()))
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "denied"
    }
}
