//! 搜索会话控制器。
//!
//! 同一时间只有一个活动会话。状态流转：
//! Idle → Connecting → Scanning → {Done, Failed, Cancelled}，
//! 终止状态之后可以直接开始新的会话。终止状态下收到的事件一律丢弃。

use tracing::{debug, error, info, warn};

use crate::error::{SessionError, TransportError};
use crate::export::{self, ExportFormat};
use crate::history::SearchHistory;
use crate::preferences::Preferences;
use crate::saved::SavedSearches;
use crate::store::PersistedStore;
use crate::transport::{Connection, Transport};
use crate::types::{ClientCommand, CompletedScan, ScanProgress, SearchRequest, SessionEvent};
use crate::view::SessionView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Scanning,
    Failed,
    Done,
    Cancelled,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Scanning)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Done | Self::Cancelled)
    }
}

/// 结果区域的占位状态，不再依赖界面上显示的文字判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsPlaceholder {
    Hidden,
    Awaiting,
    NoResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    Failed,
}

pub struct SearchSessionController<T: Transport, S: PersistedStore, V: SessionView> {
    transport: T,
    endpoint: String,
    store: S,
    view: V,
    state: SessionState,
    connection: Option<T::Connection>,
    task_id: Option<String>,
    results: Vec<String>,
    progress: Option<ScanProgress>,
    placeholder: ResultsPlaceholder,
    completed: Option<CompletedScan>,
    last_error: Option<String>,
}

impl<T: Transport, S: PersistedStore, V: SessionView> SearchSessionController<T, S, V> {
    pub fn new(transport: T, endpoint: impl Into<String>, store: S, view: V) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            store,
            view,
            state: SessionState::Idle,
            connection: None,
            task_id: None,
            results: Vec::new(),
            progress: None,
            placeholder: ResultsPlaceholder::Hidden,
            completed: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// 本次会话已经渲染的结果，按到达顺序
    pub fn results(&self) -> &[String] {
        &self.results
    }

    pub fn progress(&self) -> Option<ScanProgress> {
        self.progress
    }

    pub fn placeholder(&self) -> ResultsPlaceholder {
        self.placeholder
    }

    pub fn completed(&self) -> Option<&CompletedScan> {
        self.completed.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn history(&self) -> SearchHistory<'_, S> {
        SearchHistory::new(&self.store)
    }

    pub fn saved(&self) -> SavedSearches<'_, S> {
        SavedSearches::new(&self.store)
    }

    pub fn preferences(&self) -> Preferences<'_, S> {
        Preferences::new(&self.store)
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut T::Connection> {
        self.connection.as_mut()
    }

    pub fn export_enabled(&self) -> bool {
        self.state == SessionState::Done
            && self.completed.as_ref().is_some_and(|c| !c.results.is_empty())
    }

    /// 开始新的搜索。已有活动会话时什么都不做。
    pub async fn start(&mut self, request: SearchRequest) -> StartOutcome {
        if self.state.is_active() {
            debug!("已有搜索在进行中，忽略新的请求");
            return StartOutcome::AlreadyRunning;
        }

        self.history().add(&request);
        self.reset_for_new_session();
        self.state = SessionState::Connecting;
        self.view.set_running(true);
        info!("开始搜索: {}", request.label());

        let mut conn = match self.transport.connect(&self.endpoint).await {
            Ok(conn) => conn,
            Err(e) => {
                self.fail(e.into()).await;
                return StartOutcome::Failed;
            }
        };

        let command = ClientCommand::StartSearch { payload: request };
        if let Err(e) = conn.send(&command).await {
            conn.close().await;
            self.fail(e.into()).await;
            return StartOutcome::Failed;
        }

        self.connection = Some(conn);
        self.state = SessionState::Scanning;
        StartOutcome::Started
    }

    /// 用户主动停止。只在 Scanning 状态有效，重复调用无副作用。
    pub async fn stop(&mut self) -> bool {
        if self.state != SessionState::Scanning {
            return false;
        }
        self.close_connection().await;
        self.state = SessionState::Cancelled;
        self.view.set_running(false);
        self.view.show_stopped();
        info!("搜索已取消");
        true
    }

    /// 等待并处理一条事件。会话仍在扫描时返回 true。
    pub async fn pump(&mut self) -> bool {
        if self.state != SessionState::Scanning {
            return false;
        }
        let Some(conn) = self.connection.as_mut() else {
            return false;
        };
        let next = conn.next_event().await;
        self.apply(next).await;
        self.state == SessionState::Scanning
    }

    pub async fn run_to_completion(&mut self) -> SessionState {
        while self.pump().await {}
        self.state
    }

    pub(crate) async fn apply(&mut self, next: Option<Result<SessionEvent, TransportError>>) {
        match next {
            Some(Ok(event)) => self.handle_event(event).await,
            Some(Err(e)) => {
                if self.state == SessionState::Scanning {
                    self.fail(e.into()).await;
                }
            }
            None => {
                if self.state == SessionState::Scanning {
                    self.fail(TransportError::ClosedEarly.into()).await;
                }
            }
        }
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        if self.state != SessionState::Scanning {
            warn!("会话状态为 {:?}，丢弃事件 {}", self.state, event.kind());
            return;
        }

        match event {
            SessionEvent::Config { .. } => debug!("会话中忽略 config 事件"),
            SessionEvent::ScanStart { task_id } => {
                debug!("扫描任务开始: {:?}", task_id);
                self.task_id = task_id;
            }
            SessionEvent::ItemFound { path } => {
                self.placeholder = ResultsPlaceholder::Hidden;
                self.view.append_result(&path);
                self.results.push(path);
            }
            SessionEvent::ScanProgress { progress } => {
                self.progress = Some(progress);
                self.view.show_progress(progress);
            }
            SessionEvent::Error { message } => {
                self.fail(SessionError::Server(message)).await;
            }
            SessionEvent::ScanComplete { results, summary } => {
                self.complete(results, summary).await;
            }
        }
    }

    async fn complete(&mut self, results: Vec<String>, summary: String) {
        // 完成消息里没有结果列表时，以流式收到的结果为准
        let results = if results.is_empty() {
            self.results.clone()
        } else {
            results
        };

        if self.placeholder == ResultsPlaceholder::Awaiting {
            if results.is_empty() {
                self.placeholder = ResultsPlaceholder::NoResults;
                self.view.show_no_results();
            } else {
                self.placeholder = ResultsPlaceholder::Hidden;
                for path in &results {
                    self.view.append_result(path);
                }
                self.results = results.clone();
            }
        }

        self.close_connection().await;
        self.state = SessionState::Done;
        info!("扫描完成，共 {} 个结果", results.len());

        self.view.show_summary(&summary, results.len());
        self.view.set_running(false);
        self.view.set_export_enabled(!results.is_empty());
        self.view.notify_complete();
        self.completed = Some(CompletedScan { results, summary });
    }

    async fn fail(&mut self, err: SessionError) {
        let message = match &err {
            SessionError::Server(message) => message.clone(),
            other => other.to_string(),
        };
        error!("搜索失败: {}", err);

        self.close_connection().await;
        self.state = SessionState::Failed;
        self.placeholder = ResultsPlaceholder::Hidden;
        self.view.show_error(&message);
        self.view.set_running(false);
        self.last_error = Some(message);
    }

    async fn close_connection(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.close().await;
        }
    }

    fn reset_for_new_session(&mut self) {
        self.task_id = None;
        self.results.clear();
        self.progress = None;
        self.completed = None;
        self.last_error = None;
        self.placeholder = ResultsPlaceholder::Awaiting;
        self.view.clear_results();
        self.view.set_export_enabled(false);
    }

    /// 把完成时捕获的结果集导出为静态文档
    pub fn export_results(&self, format: ExportFormat) -> Result<String, SessionError> {
        if !self.export_enabled() {
            return Err(SessionError::NothingToExport);
        }
        let completed = self.completed.as_ref().ok_or(SessionError::NothingToExport)?;
        export::render(completed, format, chrono::Local::now())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::HISTORY_LIMIT;
    use crate::store::MemoryStore;
    use crate::types::SearchType;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    pub(crate) type Frame = Option<Result<SessionEvent, TransportError>>;

    #[derive(Default)]
    pub(crate) struct Script {
        pub connects: usize,
        pub closes: usize,
        pub sent: Vec<ClientCommand>,
        pub frames: VecDeque<Frame>,
        pub refuse_connect: bool,
    }

    #[derive(Clone, Default)]
    pub(crate) struct ScriptedTransport {
        pub script: Arc<Mutex<Script>>,
    }

    impl ScriptedTransport {
        pub fn with_events(events: Vec<SessionEvent>) -> Self {
            let transport = Self::default();
            transport
                .script
                .lock()
                .unwrap()
                .frames
                .extend(events.into_iter().map(|e| Some(Ok(e))));
            transport
        }

        pub fn push(&self, frame: Frame) {
            self.script.lock().unwrap().frames.push_back(frame);
        }

        pub fn connects(&self) -> usize {
            self.script.lock().unwrap().connects
        }

        pub fn closes(&self) -> usize {
            self.script.lock().unwrap().closes
        }
    }

    pub(crate) struct ScriptedConnection {
        script: Arc<Mutex<Script>>,
    }

    impl Transport for ScriptedTransport {
        type Connection = ScriptedConnection;

        async fn connect(&self, endpoint: &str) -> Result<ScriptedConnection, TransportError> {
            let mut script = self.script.lock().unwrap();
            if script.refuse_connect {
                return Err(TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: "refused".into(),
                });
            }
            script.connects += 1;
            Ok(ScriptedConnection {
                script: self.script.clone(),
            })
        }
    }

    impl Connection for ScriptedConnection {
        async fn send(&mut self, command: &ClientCommand) -> Result<(), TransportError> {
            self.script.lock().unwrap().sent.push(command.clone());
            Ok(())
        }

        async fn next_event(&mut self) -> Frame {
            let next = self.script.lock().unwrap().frames.pop_front();
            match next {
                Some(frame) => frame,
                // 脚本耗尽时模拟一个停滞的连接
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {
            self.script.lock().unwrap().closes += 1;
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingView {
        pub clears: usize,
        pub results: Vec<String>,
        pub progress: Option<ScanProgress>,
        pub errors: Vec<String>,
        pub no_results: bool,
        pub summary: Option<(String, usize)>,
        pub running: bool,
        pub export_enabled: bool,
        pub stopped: bool,
        pub notified: usize,
    }

    impl SessionView for RecordingView {
        fn clear_results(&mut self) {
            self.clears += 1;
            self.results.clear();
            self.progress = None;
            self.no_results = false;
        }

        fn append_result(&mut self, path: &str) {
            self.results.push(path.to_string());
        }

        fn show_progress(&mut self, progress: ScanProgress) {
            self.progress = Some(progress);
        }

        fn show_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }

        fn show_no_results(&mut self) {
            self.no_results = true;
        }

        fn show_summary(&mut self, summary: &str, total: usize) {
            self.summary = Some((summary.to_string(), total));
        }

        fn set_running(&mut self, running: bool) {
            self.running = running;
        }

        fn set_export_enabled(&mut self, enabled: bool) {
            self.export_enabled = enabled;
        }

        fn show_stopped(&mut self) {
            self.stopped = true;
        }

        fn notify_complete(&mut self) {
            self.notified += 1;
        }
    }

    pub(crate) type TestController =
        SearchSessionController<ScriptedTransport, MemoryStore, RecordingView>;

    pub(crate) fn controller(transport: &ScriptedTransport) -> TestController {
        SearchSessionController::new(
            transport.clone(),
            "ws://test/ws",
            MemoryStore::new(),
            RecordingView::default(),
        )
    }

    pub(crate) fn request(path: &str) -> SearchRequest {
        SearchRequest {
            search_path: path.into(),
            keywords: vec!["needle".into()],
            search_type: SearchType::FileName,
            excluded_folders: vec![],
            file_extensions: vec![],
            include_dot_folders: false,
            case_sensitive: false,
            use_regex: false,
            file_category: String::new(),
            min_size: None,
            max_size: None,
        }
    }

    fn found(path: &str) -> SessionEvent {
        SessionEvent::ItemFound { path: path.into() }
    }

    fn complete(results: &[&str]) -> SessionEvent {
        SessionEvent::ScanComplete {
            results: results.iter().map(|s| s.to_string()).collect(),
            summary: format!("{} found", results.len()),
        }
    }

    #[tokio::test]
    async fn streams_results_in_order_and_enables_export() {
        let transport = ScriptedTransport::with_events(vec![
            SessionEvent::ScanStart { task_id: Some("t1".into()) },
            found("a"),
            found("b"),
            complete(&["a", "b"]),
        ]);
        let mut session = controller(&transport);

        assert_eq!(session.start(request("/srv")).await, StartOutcome::Started);
        assert_eq!(session.run_to_completion().await, SessionState::Done);

        assert_eq!(session.task_id(), Some("t1"));
        assert_eq!(session.results(), ["a", "b"]);
        assert_eq!(session.view().results, ["a", "b"]);
        assert!(session.export_enabled());
        assert!(session.view().export_enabled);
        assert!(!session.view().running);
        assert_eq!(session.view().notified, 1);
        assert_eq!(session.completed().unwrap().results, ["a", "b"]);

        let script = transport.script.lock().unwrap();
        assert_eq!(
            script.sent,
            vec![ClientCommand::StartSearch { payload: request("/srv") }]
        );
    }

    #[tokio::test]
    async fn start_while_scanning_is_a_no_op() {
        let transport = ScriptedTransport::default();
        let mut session = controller(&transport);

        assert_eq!(session.start(request("/one")).await, StartOutcome::Started);
        assert_eq!(
            session.start(request("/two")).await,
            StartOutcome::AlreadyRunning
        );

        assert_eq!(transport.connects(), 1);
        assert_eq!(session.history().list(), vec![request("/one")]);
        assert_eq!(session.state(), SessionState::Scanning);
    }

    #[tokio::test]
    async fn history_keeps_newest_fifteen() {
        let transport = ScriptedTransport::default();
        let mut session = controller(&transport);
        for n in 0..18 {
            // 每次都让会话进入终止状态再开始下一次
            session.start(request(&format!("/p{n}"))).await;
            session.stop().await;
        }

        let history = session.history().list();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].search_path, "/p17");
        assert_eq!(history[HISTORY_LIMIT - 1].search_path, "/p3");
    }

    #[tokio::test]
    async fn stop_discards_late_completion() {
        let transport = ScriptedTransport::with_events(vec![SessionEvent::ScanStart {
            task_id: Some("t9".into()),
        }]);
        let mut session = controller(&transport);

        session.start(request("/srv")).await;
        assert!(session.pump().await);
        assert!(session.stop().await);
        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(session.view().stopped);
        assert_eq!(transport.closes(), 1);

        session.handle_event(complete(&["late"])).await;

        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(session.results().is_empty());
        assert!(session.completed().is_none());
        assert!(!session.export_enabled());
        assert!(matches!(
            session.export_results(ExportFormat::Json),
            Err(SessionError::NothingToExport)
        ));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let transport = ScriptedTransport::default();
        let mut session = controller(&transport);
        assert!(!session.stop().await);

        session.start(request("/srv")).await;
        assert!(session.stop().await);
        assert!(!session.stop().await);
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn progress_replaces_previous_value() {
        let transport = ScriptedTransport::with_events(vec![
            SessionEvent::ScanProgress {
                progress: ScanProgress { scanned: 5, found: 1 },
            },
            SessionEvent::ScanProgress {
                progress: ScanProgress { scanned: 9, found: 2 },
            },
        ]);
        let mut session = controller(&transport);
        session.start(request("/srv")).await;
        session.pump().await;
        session.pump().await;

        let expected = Some(ScanProgress { scanned: 9, found: 2 });
        assert_eq!(session.progress(), expected);
        assert_eq!(session.view().progress, expected);
    }

    #[tokio::test]
    async fn server_error_fails_with_verbatim_message() {
        let transport = ScriptedTransport::with_events(vec![
            found("a"),
            SessionEvent::Error {
                message: "Path does not exist".into(),
            },
            complete(&["a"]),
        ]);
        let mut session = controller(&transport);
        session.start(request("/nope")).await;

        assert_eq!(session.run_to_completion().await, SessionState::Failed);
        assert_eq!(session.last_error(), Some("Path does not exist"));
        assert_eq!(session.view().errors, ["Path does not exist"]);
        assert!(!session.export_enabled());
        assert_eq!(transport.closes(), 1);
    }

    #[tokio::test]
    async fn connect_failure_fails_the_session() {
        let transport = ScriptedTransport::default();
        transport.script.lock().unwrap().refuse_connect = true;
        let mut session = controller(&transport);

        assert_eq!(session.start(request("/srv")).await, StartOutcome::Failed);
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.view().errors.len(), 1);
        // 失败后可以重新开始
        transport.script.lock().unwrap().refuse_connect = false;
        assert_eq!(session.start(request("/srv")).await, StartOutcome::Started);
        assert_eq!(session.history().list().len(), 2);
    }

    #[tokio::test]
    async fn dropped_connection_fails_once() {
        let transport = ScriptedTransport::with_events(vec![found("a")]);
        transport.push(Some(Err(TransportError::Dropped("reset".into()))));
        let mut session = controller(&transport);
        session.start(request("/srv")).await;

        assert_eq!(session.run_to_completion().await, SessionState::Failed);
        assert_eq!(session.view().errors.len(), 1);
        assert_eq!(session.results(), ["a"]);
    }

    #[tokio::test]
    async fn closed_before_completion_is_a_failure() {
        let transport = ScriptedTransport::with_events(vec![found("a")]);
        transport.push(None);
        let mut session = controller(&transport);
        session.start(request("/srv")).await;

        assert_eq!(session.run_to_completion().await, SessionState::Failed);
        assert_eq!(
            session.last_error(),
            Some(TransportError::ClosedEarly.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn empty_completion_shows_no_results() {
        let transport = ScriptedTransport::with_events(vec![complete(&[])]);
        let mut session = controller(&transport);
        session.start(request("/srv")).await;
        session.run_to_completion().await;

        assert_eq!(session.placeholder(), ResultsPlaceholder::NoResults);
        assert!(session.view().no_results);
        assert!(!session.export_enabled());
    }

    #[tokio::test]
    async fn completion_without_streamed_items_backfills_view() {
        let transport = ScriptedTransport::with_events(vec![complete(&["x", "y"])]);
        let mut session = controller(&transport);
        session.start(request("/srv")).await;
        session.run_to_completion().await;

        assert_eq!(session.placeholder(), ResultsPlaceholder::Hidden);
        assert_eq!(session.view().results, ["x", "y"]);
        assert!(session.export_enabled());
    }

    #[tokio::test]
    async fn new_session_clears_previous_results() {
        let transport = ScriptedTransport::with_events(vec![found("old"), complete(&["old"])]);
        let mut session = controller(&transport);
        session.start(request("/srv")).await;
        session.run_to_completion().await;

        session.start(request("/srv")).await;
        assert!(session.results().is_empty());
        assert!(session.view().results.is_empty());
        assert!(!session.view().export_enabled);
        assert_eq!(session.placeholder(), ResultsPlaceholder::Awaiting);
        assert_eq!(session.view().clears, 2);
    }
}
