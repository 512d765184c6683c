//! 界面动作分发表。输入来源（按钮、命令行、信号）只负责产生 `UiAction`，
//! 状态机只通过 `dispatch` 接收它们。

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::SessionError;
use crate::export::ExportFormat;
use crate::session::{SearchSessionController, SessionState, StartOutcome};
use crate::store::PersistedStore;
use crate::transport::{Connection, Transport};
use crate::types::SearchRequest;
use crate::view::SessionView;

#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    StartSearch(SearchRequest),
    Stop,
    Export(ExportFormat),
    SaveSearch { name: String, request: SearchRequest },
    LoadSearch(String),
    DeleteSearch(String),
    LoadHistory(usize),
    RemoveHistory(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Started(StartOutcome),
    Stopped(bool),
    Exported(String),
    Saved,
    Loaded(SearchRequest),
    Deleted,
    Removed(SearchRequest),
}

enum Step<E> {
    Action(Option<UiAction>),
    Event(E),
}

impl<T: Transport, S: PersistedStore, V: SessionView> SearchSessionController<T, S, V> {
    pub async fn dispatch(&mut self, action: UiAction) -> Result<ActionOutcome, SessionError> {
        debug!("分发动作: {:?}", action);
        match action {
            UiAction::StartSearch(request) => Ok(ActionOutcome::Started(self.start(request).await)),
            UiAction::Stop => Ok(ActionOutcome::Stopped(self.stop().await)),
            UiAction::Export(format) => self.export_results(format).map(ActionOutcome::Exported),
            UiAction::SaveSearch { name, request } => {
                self.saved().save(&name, &request)?;
                Ok(ActionOutcome::Saved)
            }
            UiAction::LoadSearch(name) => self.saved().load(&name).map(ActionOutcome::Loaded),
            UiAction::DeleteSearch(name) => {
                self.saved().delete(&name)?;
                Ok(ActionOutcome::Deleted)
            }
            UiAction::LoadHistory(index) => self.history().get(index).map(ActionOutcome::Loaded),
            UiAction::RemoveHistory(index) => {
                self.history().remove(index).map(ActionOutcome::Removed)
            }
        }
    }

    /// 驱动当前会话直到进入非扫描状态。扫描期间同时接收用户动作，
    /// 事件和动作谁先到就先处理谁。动作通道关闭后只继续消费事件。
    pub async fn run_session(
        &mut self,
        actions: &mut mpsc::UnboundedReceiver<UiAction>,
    ) -> SessionState {
        let mut actions_open = true;
        while self.state() == SessionState::Scanning {
            let step = {
                let Some(conn) = self.connection_mut() else {
                    break;
                };
                if actions_open {
                    tokio::select! {
                        action = actions.recv() => Step::Action(action),
                        next = conn.next_event() => Step::Event(next),
                    }
                } else {
                    Step::Event(conn.next_event().await)
                }
            };

            match step {
                Step::Action(None) => actions_open = false,
                Step::Action(Some(action)) => {
                    if let Err(e) = self.dispatch(action).await {
                        debug!("动作执行失败: {}", e);
                    }
                }
                Step::Event(next) => self.apply(next).await,
            }
        }
        self.state()
    }
}
