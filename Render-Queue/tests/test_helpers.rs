#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use easy_diffusion_rs::{EasyDiffusionError, RenderRequest, TaskProgress};
use render_queue::*;

/// Backend calls in the order they were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Submit(String),
    Poll(u64),
    Stop(u64),
}

/// Scripted poll answer for a task.
pub enum PollStep {
    Progress(u8),
    Done(Vec<Vec<u8>>),
    Fail(EasyDiffusionError),
}

/// In-memory backend.
///
/// Submissions succeed with sequential task ids unless a result was
/// queued with [`push_submit`](Self::push_submit). Tasks without a poll
/// script finish on their first poll with one image; a task marked with
/// [`hang`](Self::hang) never finishes.
#[derive(Default)]
pub struct FakeBackend {
    next_task: AtomicU64,
    submits: Mutex<VecDeque<Result<u64, EasyDiffusionError>>>,
    scripts: Mutex<HashMap<u64, VecDeque<PollStep>>>,
    hanging: Mutex<Vec<u64>>,
    calls: Mutex<Vec<BackendCall>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_submit(&self, result: Result<u64, EasyDiffusionError>) {
        self.submits.lock().unwrap().push_back(result);
    }

    pub fn script(&self, task_id: u64, steps: Vec<PollStep>) {
        self.scripts.lock().unwrap().insert(task_id, steps.into());
    }

    pub fn hang(&self, task_id: u64) {
        self.hanging.lock().unwrap().push(task_id);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn submitted_prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Submit(prompt) => Some(prompt),
                _ => None,
            })
            .collect()
    }

    pub fn stops(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Stop(task) => Some(task),
                _ => None,
            })
            .collect()
    }
}

impl RenderBackend for FakeBackend {
    async fn submit(&self, request: &RenderRequest) -> easy_diffusion_rs::Result<u64> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Submit(request.prompt().to_string()));
        let scripted = self.submits.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => Ok(self.next_task.fetch_add(1, Ordering::SeqCst) + 1),
        }
    }

    async fn poll(&self, task_id: u64) -> easy_diffusion_rs::Result<TaskProgress> {
        self.calls.lock().unwrap().push(BackendCall::Poll(task_id));
        if self.hanging.lock().unwrap().contains(&task_id) {
            return Ok(TaskProgress::default());
        }
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&task_id)
            .map(|steps| steps.pop_front());
        match step {
            Some(Some(PollStep::Progress(percent))) => Ok(TaskProgress {
                percent,
                images: None,
            }),
            Some(Some(PollStep::Done(images))) => Ok(TaskProgress {
                percent: 100,
                images: Some(images),
            }),
            Some(Some(PollStep::Fail(e))) => Err(e),
            // Script exhausted: keep reporting "still running".
            Some(None) => Ok(TaskProgress::default()),
            None => Ok(TaskProgress {
                percent: 100,
                images: Some(vec![format!("image-{}", task_id).into_bytes()]),
            }),
        }
    }

    async fn stop(&self, task_id: u64) {
        self.calls.lock().unwrap().push(BackendCall::Stop(task_id));
    }
}

pub fn refused() -> EasyDiffusionError {
    EasyDiffusionError::ConnectionRefused {
        endpoint: "http://localhost:9000".into(),
    }
}

/// Supervisor that counts restarts and either succeeds or fails.
#[derive(Default)]
pub struct FakeSupervisor {
    pub restarts: AtomicUsize,
    fail: bool,
}

impl FakeSupervisor {
    pub fn working() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            restarts: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn restart_count(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl Supervisor for FakeSupervisor {
    async fn ensure_running(&self) -> easy_diffusion_rs::Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(EasyDiffusionError::StartupTimeout(Duration::from_secs(30)))
        } else {
            Ok(())
        }
    }
}

/// Everything the queue told a requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    Announce { message_id: i64, handle: u64, text: String },
    Update { message_id: i64, handle: u64, text: String },
    Delete { message_id: i64, handle: u64 },
    Images { message_id: i64, count: usize, caption: String },
}

#[derive(Default)]
pub struct RecordingNotifier {
    next_handle: AtomicU64,
    owners: Mutex<HashMap<u64, i64>>,
    notes: Mutex<Vec<Note>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notes(&self) -> Vec<Note> {
        self.notes.lock().unwrap().clone()
    }

    /// Texts shown for one request, in order (announcements and edits).
    pub fn texts_for(&self, message_id: i64) -> Vec<String> {
        self.notes()
            .into_iter()
            .filter_map(|n| match n {
                Note::Announce { message_id: m, text, .. } if m == message_id => Some(text),
                Note::Update { message_id: m, text, .. } if m == message_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_text_for(&self, message_id: i64) -> Option<String> {
        self.texts_for(message_id).pop()
    }

    pub fn deliveries(&self) -> Vec<(i64, usize, String)> {
        self.notes()
            .into_iter()
            .filter_map(|n| match n {
                Note::Images {
                    message_id,
                    count,
                    caption,
                } => Some((message_id, count, caption)),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self, message_id: i64) -> bool {
        self.notes()
            .iter()
            .any(|n| matches!(n, Note::Delete { message_id: m, .. } if *m == message_id))
    }

    fn owner(&self, handle: u64) -> i64 {
        self.owners.lock().unwrap().get(&handle).copied().unwrap_or(-1)
    }
}

impl Notifier for RecordingNotifier {
    type Handle = u64;

    async fn announce(&self, origin: &Origin, text: &str) -> anyhow::Result<u64> {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.owners.lock().unwrap().insert(handle, origin.message_id);
        self.notes.lock().unwrap().push(Note::Announce {
            message_id: origin.message_id,
            handle,
            text: text.to_string(),
        });
        Ok(handle)
    }

    async fn update(&self, handle: &u64, text: &str) -> anyhow::Result<()> {
        let message_id = self.owner(*handle);
        self.notes.lock().unwrap().push(Note::Update {
            message_id,
            handle: *handle,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_status(&self, handle: &u64) -> anyhow::Result<()> {
        let message_id = self.owner(*handle);
        self.notes.lock().unwrap().push(Note::Delete {
            message_id,
            handle: *handle,
        });
        Ok(())
    }

    async fn deliver_images(
        &self,
        origin: &Origin,
        images: &[Vec<u8>],
        caption: &str,
    ) -> anyhow::Result<()> {
        self.notes.lock().unwrap().push(Note::Images {
            message_id: origin.message_id,
            count: images.len(),
            caption: caption.to_string(),
        });
        Ok(())
    }
}

pub type TestQueue = RenderQueue<Arc<FakeBackend>, Arc<FakeSupervisor>, Arc<RecordingNotifier>>;

pub struct Harness {
    pub queue: Arc<TestQueue>,
    pub backend: Arc<FakeBackend>,
    pub supervisor: Arc<FakeSupervisor>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(config: QueueConfig) -> Self {
        Self::with_supervisor(config, FakeSupervisor::working())
    }

    pub fn with_supervisor(config: QueueConfig, supervisor: Arc<FakeSupervisor>) -> Self {
        let backend = FakeBackend::new();
        let notifier = RecordingNotifier::new();
        let queue = RenderQueue::new(
            Arc::clone(&backend),
            Arc::clone(&supervisor),
            Arc::clone(&notifier),
            config,
        );
        Self {
            queue,
            backend,
            supervisor,
            notifier,
        }
    }
}

pub fn request(prompt: &str) -> RenderRequest {
    RenderRequest::builder(prompt).seed(1).build().unwrap()
}

/// Wait (in virtual time) until `cond` holds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..100_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// Minimal Easy Diffusion HTTP server on a loopback port.
///
/// `/render` accepts every job as `task`. Each `/image/stream/<task>` read
/// takes the next scripted `(status line, body)` reply; the last one
/// repeats.
pub struct FakeEasyDiffusion {
    pub endpoint: String,
    stream_reads: Arc<AtomicUsize>,
}

impl FakeEasyDiffusion {
    pub async fn start(task: u64, stream: Vec<(&'static str, String)>) -> Self {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let stream_reads = Arc::new(AtomicUsize::new(0));
        let reads = Arc::clone(&stream_reads);
        let replies = Arc::new(Mutex::new(VecDeque::from(stream)));

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut raw = Vec::new();
                let mut buf = [0u8; 4096];
                let head_end = loop {
                    if let Some(i) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                        break Some(i + 4);
                    }
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break None,
                        Ok(n) => raw.extend_from_slice(&buf[..n]),
                    }
                };
                let Some(head_end) = head_end else { continue };
                let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
                let content_length = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while raw.len() < head_end + content_length {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => raw.extend_from_slice(&buf[..n]),
                    }
                }

                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let (status, body) = if path == "/render" {
                    ("200 OK", format!(r#"{{"status":"Online","task":{}}}"#, task))
                } else if path.starts_with("/image/stream/") {
                    reads.fetch_add(1, Ordering::SeqCst);
                    let mut replies = replies.lock().unwrap();
                    if replies.len() > 1 {
                        replies.pop_front().unwrap()
                    } else {
                        replies.front().cloned().unwrap()
                    }
                } else if path == "/ping" {
                    ("200 OK", r#"{"status":"Online"}"#.to_string())
                } else {
                    ("200 OK", "{}".to_string())
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            endpoint,
            stream_reads,
        }
    }

    pub fn stream_reads(&self) -> usize {
        self.stream_reads.load(Ordering::SeqCst)
    }
}
