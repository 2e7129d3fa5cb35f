use super::model::{UploadEvent, UploadFailure, UploadFile, UploadOutcome, UploadState, UploadTask};
use super::progress::ProgressTracker;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::transport::{ApiRequest, ProgressSink};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

/// Backend endpoint receiving invoice files.
pub const UPLOAD_PATH: &str = "/api/v1/files/upload";
/// Multipart field name of the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct ActiveTask {
    task: UploadTask,
    sender: Option<mpsc::UnboundedSender<UploadEvent>>,
}

/// State shared between the orchestrator, its spawned transfers, and handles.
#[derive(Default)]
struct Shared {
    /// Id of the task whose events are visible; 0 when none.
    current: AtomicU64,
    active: Mutex<Option<ActiveTask>>,
    selected: Mutex<Option<UploadFile>>,
}

impl Shared {
    /// Delivers `event` if task `id` is still the visible one.
    fn emit(&self, id: u64, event: UploadEvent) -> bool {
        let mut active = lock(&self.active);
        let Some(entry) = active.as_mut().filter(|entry| entry.task.id == id) else {
            tracing::debug!(task = id, ?event, "Discarding event of superseded upload");
            return false;
        };

        let terminal = match &event {
            UploadEvent::Progress(percent) => {
                entry.task.progress_percent = *percent;
                false
            }
            UploadEvent::Finished(outcome) => {
                entry.task.state = outcome.clone().into();
                entry.task.finished_at = Some(Utc::now());
                true
            }
        };

        if let Some(sender) = &entry.sender {
            let _ = sender.send(event);
        }
        if terminal {
            // Closing the channel ends the handle's event sequence.
            entry.sender = None;
        }
        true
    }

    fn set_state(&self, id: u64, state: UploadState) {
        let mut active = lock(&self.active);
        if let Some(entry) = active.as_mut().filter(|entry| entry.task.id == id) {
            entry.task.state = state;
        }
    }

    /// Drops the visible task, if any. Its handle observes no further events.
    fn supersede(&self, active: &mut Option<ActiveTask>) {
        if let Some(previous) = active.take() {
            if !previous.task.state.is_terminal() {
                tracing::info!(
                    task = previous.task.id,
                    file = %previous.task.file_name,
                    "Superseding in-flight upload"
                );
            }
        }
        self.current.store(0, Ordering::Release);
    }

    fn is_current(&self, id: u64) -> bool {
        self.current.load(Ordering::Acquire) == id
    }
}

/// Drives single-file invoice uploads through the [`Gateway`].
///
/// At most one task is visible at a time. Starting a task, or selecting a
/// new file, supersedes the previous task: its transfer may still run to
/// completion in the background but none of its later events are delivered.
pub struct UploadOrchestrator {
    gateway: Gateway,
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl UploadOrchestrator {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            shared: Arc::new(Shared::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Selects a file for a later [`UploadOrchestrator::start_selected`].
    ///
    /// Selecting a file discards the current task.
    pub fn select(&self, file: UploadFile) {
        {
            let mut active = lock(&self.shared.active);
            self.shared.supersede(&mut active);
        }
        tracing::debug!(file = %file.name, size = file.size(), "File selected");
        *lock(&self.shared.selected) = Some(file);
    }

    /// Returns to the empty-selection state.
    pub fn clear_selection(&self) {
        *lock(&self.shared.selected) = None;
    }

    pub fn selected(&self) -> Option<UploadFile> {
        lock(&self.shared.selected).clone()
    }

    /// Snapshot of the visible task.
    pub fn snapshot(&self) -> Option<UploadTask> {
        lock(&self.shared.active)
            .as_ref()
            .map(|entry| entry.task.clone())
    }

    pub fn is_uploading(&self) -> bool {
        self.snapshot()
            .is_some_and(|task| task.state == UploadState::Uploading)
    }

    /// Uploads the selected file; fails with `NoFileSelected` if there is none.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start_selected(&self) -> UploadHandle {
        match self.selected() {
            Some(file) => self.start(file),
            None => {
                let (id, handle) = self.begin("", 0);
                self.shared.emit(
                    id,
                    UploadEvent::Finished(UploadOutcome::failed(UploadFailure::NoFileSelected)),
                );
                handle
            }
        }
    }

    /// Starts uploading `file`, superseding any visible task.
    ///
    /// Preconditions are checked before anything is sent: without a session
    /// the task fails with `NotAuthenticated`, and files that are not PDF,
    /// JPG, JPEG or PNG fail with `UnsupportedFormat`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self, file: UploadFile) -> UploadHandle {
        let (id, handle) = self.begin(&file.name, file.size());
        *lock(&self.shared.selected) = Some(file.clone());

        if !self.gateway.session().is_authenticated() {
            tracing::debug!(task = id, "Upload refused without a session");
            self.fail(id, UploadFailure::NotAuthenticated);
            return handle;
        }
        if file.format().is_none() {
            tracing::debug!(task = id, file = %file.name, "Upload refused for unsupported format");
            self.fail(id, UploadFailure::UnsupportedFormat(file.name.clone()));
            return handle;
        }

        self.shared.set_state(id, UploadState::Uploading);
        let tracker = Arc::new(Mutex::new(ProgressTracker::new()));
        if let Some(percent) = lock(&tracker).start() {
            self.shared.emit(id, UploadEvent::Progress(percent));
        }

        tracing::info!(task = id, file = %file.name, size = file.size(), "Starting upload");

        let gateway = self.gateway.clone();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let sink: ProgressSink = {
                let shared = shared.clone();
                let tracker = tracker.clone();
                Arc::new(move |sent, total| {
                    // The tracker lock is held while emitting so concurrent
                    // reports cannot reorder percentages.
                    let mut tracker = lock(&tracker);
                    if let Some(percent) = tracker.update(sent, total) {
                        shared.emit(id, UploadEvent::Progress(percent));
                    }
                })
            };

            let request = ApiRequest::post(UPLOAD_PATH).multipart(UPLOAD_FIELD, file);
            let outcome = match gateway.send_with_progress(request, sink).await {
                Ok(_) => {
                    let mut tracker = lock(&tracker);
                    if let Some(percent) = tracker.finish() {
                        shared.emit(id, UploadEvent::Progress(percent));
                    }
                    UploadOutcome::Succeeded
                }
                Err(err) => UploadOutcome::failed(failure_from_gateway(err)),
            };

            if outcome.is_success() && shared.is_current(id) {
                *lock(&shared.selected) = None;
            }
            match &outcome {
                UploadOutcome::Succeeded => tracing::info!(task = id, "Upload succeeded"),
                UploadOutcome::Failed { reason } => {
                    tracing::warn!(task = id, reason = %reason, "Upload failed")
                }
            }
            shared.emit(id, UploadEvent::Finished(outcome));
        });

        handle
    }

    fn fail(&self, id: u64, reason: UploadFailure) {
        self.shared
            .emit(id, UploadEvent::Finished(UploadOutcome::failed(reason)));
    }

    /// Registers a fresh task as the visible one.
    fn begin(&self, file_name: &str, size: u64) -> (u64, UploadHandle) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut active = lock(&self.shared.active);
        self.shared.supersede(&mut active);
        *active = Some(ActiveTask {
            task: UploadTask {
                id,
                file_name: file_name.to_string(),
                size,
                progress_percent: 0,
                state: UploadState::Idle,
                started_at: Utc::now(),
                finished_at: None,
            },
            sender: Some(tx),
        });
        self.shared.current.store(id, Ordering::Release);
        drop(active);

        let handle = UploadHandle {
            id,
            rx,
            shared: self.shared.clone(),
            done: false,
        };
        (id, handle)
    }
}

/// Maps a gateway error onto the upload failure reasons.
pub fn failure_from_gateway(err: GatewayError) -> UploadFailure {
    match err {
        GatewayError::Unauthenticated => UploadFailure::NotAuthenticated,
        GatewayError::Unauthorized => UploadFailure::SessionExpired,
        GatewayError::Rejected { detail, .. } => UploadFailure::ServerRejected(detail),
        GatewayError::Unreachable { .. } => UploadFailure::NetworkError,
        GatewayError::InvalidShape { message } => UploadFailure::ServerRejected(message),
    }
}

/// Lazy sequence of one task's events.
///
/// The sequence ends after [`UploadEvent::Finished`], or as soon as the task
/// is superseded.
pub struct UploadHandle {
    id: u64,
    rx: mpsc::UnboundedReceiver<UploadEvent>,
    shared: Arc<Shared>,
    done: bool,
}

impl UploadHandle {
    pub fn task_id(&self) -> u64 {
        self.id
    }

    pub fn is_superseded(&self) -> bool {
        !self.shared.is_current(self.id)
    }

    /// Next event, or `None` when the sequence is over.
    pub async fn next(&mut self) -> Option<UploadEvent> {
        if self.done || self.is_superseded() {
            return None;
        }
        let event = self.rx.recv().await;
        if self.is_superseded() {
            self.done = true;
            return None;
        }
        match event {
            Some(UploadEvent::Finished(outcome)) => {
                self.done = true;
                Some(UploadEvent::Finished(outcome))
            }
            Some(event) => Some(event),
            None => {
                self.done = true;
                None
            }
        }
    }

    /// Drains the sequence and returns the terminal outcome, or `None` if the
    /// task was superseded first.
    pub async fn wait(mut self) -> Option<UploadOutcome> {
        while let Some(event) = self.next().await {
            if let UploadEvent::Finished(outcome) = event {
                return Some(outcome);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::InMemoryCredentialStore;
    use crate::session::{SessionManager, SessionStatus, TokenPair};
    use crate::transport::{ApiResponse, HttpTransport, RequestBody, TransportError};
    use serde_json::json;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    struct Script {
        before_gate: Vec<(u64, u64)>,
        gate: Option<Arc<Notify>>,
        after_gate: Vec<(u64, u64)>,
        response: Result<ApiResponse, TransportError>,
    }

    impl Script {
        fn ok(steps: Vec<(u64, u64)>) -> Self {
            Self {
                before_gate: steps,
                gate: None,
                after_gate: Vec::new(),
                response: Ok(ApiResponse::new(200, "{}")),
            }
        }

        fn respond(response: Result<ApiResponse, TransportError>) -> Self {
            Self {
                before_gate: Vec::new(),
                gate: None,
                after_gate: Vec::new(),
                response,
            }
        }
    }

    #[derive(Default)]
    struct UploadTransport {
        scripts: Mutex<VecDeque<Script>>,
        calls: Mutex<Vec<String>>,
    }

    impl UploadTransport {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for UploadTransport {
        async fn execute(
            &self,
            request: ApiRequest,
            _bearer: Option<String>,
            progress: Option<ProgressSink>,
        ) -> Result<ApiResponse, TransportError> {
            let file_name = match &request.body {
                RequestBody::Multipart { file, .. } => file.name.clone(),
                _ => String::new(),
            };
            self.calls.lock().unwrap().push(file_name);
            let script = self.scripts.lock().unwrap().pop_front().unwrap();
            let progress = progress.unwrap();

            for (sent, total) in script.before_gate {
                progress(sent, total);
                tokio::task::yield_now().await;
            }
            if let Some(gate) = script.gate {
                gate.notified().await;
            }
            for (sent, total) in script.after_gate {
                progress(sent, total);
            }
            script.response
        }
    }

    fn setup(
        scripts: Vec<Script>,
        authenticated: bool,
    ) -> (UploadOrchestrator, Arc<UploadTransport>, Arc<SessionManager>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let session = Arc::new(SessionManager::restore(store).unwrap());
        if authenticated {
            session
                .establish(TokenPair::new("tok", "ref"), "alice")
                .unwrap();
        }
        let transport = UploadTransport::new(scripts);
        let gateway = Gateway::new(session.clone(), transport.clone());
        (UploadOrchestrator::new(gateway), transport, session)
    }

    fn invoice(name: &str) -> UploadFile {
        UploadFile::new(name, vec![0u8; 200])
    }

    async fn collect(handle: &mut UploadHandle) -> Vec<UploadEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_hundred() {
        let (orchestrator, _, _) = setup(
            vec![Script::ok(vec![(0, 200), (60, 200), (50, 200), (150, 200), (199, 200)])],
            true,
        );

        let mut handle = orchestrator.start(invoice("march.pdf"));
        let events = collect(&mut handle).await;

        assert_eq!(
            events,
            vec![
                UploadEvent::Progress(0),
                UploadEvent::Progress(30),
                UploadEvent::Progress(75),
                UploadEvent::Progress(100),
                UploadEvent::Finished(UploadOutcome::Succeeded),
            ]
        );
    }

    #[tokio::test]
    async fn test_success_clears_selection() {
        let (orchestrator, _, _) = setup(vec![Script::ok(vec![(200, 200)])], true);

        orchestrator.select(invoice("march.pdf"));
        assert!(orchestrator.selected().is_some());

        let outcome = orchestrator.start_selected().wait().await;
        assert_eq!(outcome, Some(UploadOutcome::Succeeded));
        assert!(orchestrator.selected().is_none());

        let task = orchestrator.snapshot().unwrap();
        assert_eq!(task.state, UploadState::Succeeded);
        assert_eq!(task.progress_percent, 100);
        assert!(task.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_anonymous_fails_without_gateway() {
        let (orchestrator, transport, _) = setup(vec![], false);

        let outcome = orchestrator.start(invoice("march.pdf")).wait().await;
        assert_eq!(
            outcome,
            Some(UploadOutcome::failed(UploadFailure::NotAuthenticated))
        );
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_nothing_selected() {
        let (orchestrator, transport, _) = setup(vec![], true);

        let outcome = orchestrator.start_selected().wait().await;
        assert_eq!(
            outcome,
            Some(UploadOutcome::failed(UploadFailure::NoFileSelected))
        );
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let (orchestrator, transport, _) = setup(vec![], true);

        let outcome = orchestrator.start(invoice("notes.txt")).wait().await;
        assert_eq!(
            outcome,
            Some(UploadOutcome::failed(UploadFailure::UnsupportedFormat(
                "notes.txt".to_string()
            )))
        );
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_classification() {
        let (orchestrator, _, session) = setup(
            vec![
                Script::respond(Ok(ApiResponse::with_json(
                    400,
                    &json!({"detail": "File too large"}),
                ))),
                Script::respond(Err(TransportError::Timeout)),
                Script::respond(Ok(ApiResponse::new(401, ""))),
            ],
            true,
        );

        let rejected = orchestrator.start(invoice("a.pdf")).wait().await;
        assert_eq!(
            rejected,
            Some(UploadOutcome::failed(UploadFailure::ServerRejected(
                "File too large".to_string()
            )))
        );
        // A failed upload keeps the selection for a manual retry.
        assert!(orchestrator.selected().is_some());

        let network = orchestrator.start(invoice("a.pdf")).wait().await;
        assert_eq!(
            network,
            Some(UploadOutcome::failed(UploadFailure::NetworkError))
        );

        let expired = orchestrator.start(invoice("a.pdf")).wait().await;
        assert_eq!(
            expired,
            Some(UploadOutcome::failed(UploadFailure::SessionExpired))
        );
        assert_eq!(session.status(), SessionStatus::Anonymous);
    }

    #[tokio::test]
    async fn test_new_upload_supersedes_in_flight_one() {
        let gate = Arc::new(Notify::new());
        let (orchestrator, _, _) = setup(
            vec![
                Script {
                    before_gate: vec![(20, 200)],
                    gate: Some(gate.clone()),
                    after_gate: vec![(120, 200), (200, 200)],
                    response: Ok(ApiResponse::new(200, "{}")),
                },
                Script::ok(vec![(100, 200), (200, 200)]),
            ],
            true,
        );

        let mut first = orchestrator.start(invoice("a.pdf"));
        assert_eq!(first.next().await, Some(UploadEvent::Progress(0)));
        assert_eq!(first.next().await, Some(UploadEvent::Progress(10)));
        assert!(orchestrator.is_uploading());

        let mut second = orchestrator.start(invoice("b.pdf"));
        assert!(first.is_superseded());
        gate.notify_one();

        let second_events = collect(&mut second).await;
        assert_eq!(
            second_events,
            vec![
                UploadEvent::Progress(0),
                UploadEvent::Progress(50),
                UploadEvent::Progress(100),
                UploadEvent::Finished(UploadOutcome::Succeeded),
            ]
        );

        // Let the abandoned transfer finish in the background.
        tokio::task::yield_now().await;
        assert_eq!(first.next().await, None);

        let task = orchestrator.snapshot().unwrap();
        assert_eq!(task.file_name, "b.pdf");
        assert_eq!(task.state, UploadState::Succeeded);
    }

    #[tokio::test]
    async fn test_selecting_a_file_supersedes_task() {
        let gate = Arc::new(Notify::new());
        let (orchestrator, _, _) = setup(
            vec![Script {
                before_gate: vec![],
                gate: Some(gate.clone()),
                after_gate: vec![(200, 200)],
                response: Ok(ApiResponse::new(200, "{}")),
            }],
            true,
        );

        let mut handle = orchestrator.start(invoice("a.pdf"));
        assert_eq!(handle.next().await, Some(UploadEvent::Progress(0)));

        orchestrator.select(invoice("b.png"));
        gate.notify_one();

        assert_eq!(handle.next().await, None);
        assert!(orchestrator.snapshot().is_none());
        assert_eq!(orchestrator.selected().unwrap().name, "b.png");
    }

    #[test]
    fn test_failure_from_gateway() {
        assert_eq!(
            failure_from_gateway(GatewayError::Unauthorized),
            UploadFailure::SessionExpired
        );
        assert_eq!(
            failure_from_gateway(GatewayError::unreachable("dns")),
            UploadFailure::NetworkError
        );
        assert_eq!(
            failure_from_gateway(GatewayError::rejected(413, "too big")),
            UploadFailure::ServerRejected("too big".to_string())
        );
    }
}
