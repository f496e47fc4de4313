use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::{Chat, ChatSummary, MessageStatus, TodoCommand, TodoEvent};
use crate::providers::{BackendError, ReplyBackend, ReplyOutcome, TodoApi};
use crate::services::chat::dispatch_reply;
use crate::services::export::export_to_markdown;
use crate::services::store::{append_optimistic, new_chat};
use crate::services::summaries::ChatSummarySource;
use crate::services::todos::run_todo;
use crate::services::view::SidebarView;
use crate::services::{
    AppSettings, ChatError, ChatRepository, ChatStore, Database, Reconciler, Reconciliation,
    ReplyTicket, SettingsService, SidebarState, SummaryFeed,
};

/// Viewport assumed when none has been reported.
const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMsg {
    OpenChat(String),
    NewChat(String),
    SendMessage(String),
    RetryReply(String),
    AbortReply,
    ListChats,
    ToggleSidebar,
    ViewportResized(u32),
    SetUsername(String),
    PinChat { chat_id: String, pinned: bool },
    Todo(TodoCommand),
    Export,
}

#[derive(Debug)]
pub enum AppCmd {
    ReplyFinished {
        ticket: ReplyTicket,
        outcome: ReplyOutcome,
    },
    TodoFinished(Result<TodoEvent, BackendError>),
}

/// Everything the presentation layer needs to redraw or notify.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    ChatUpdated(Chat),
    /// The requested chat does not exist; show the default view instead.
    Redirect { missing_id: String },
    ReplyFailed { message_id: String, reason: String },
    /// Non-blocking notice, e.g. a write that only reached memory.
    Warning(String),
    Chats(Vec<ChatSummary>),
    Sidebar(SidebarView),
    Todo(TodoEvent),
    Exported(String),
}

/// A reply task that has been spawned and not yet reported back.
struct InFlight {
    chat_id: String,
    message_id: String,
    cancel: CancellationToken,
}

pub struct App {
    store: ChatStore,
    reconciler: Reconciler,
    backend: Arc<dyn ReplyBackend>,
    todos: Option<Arc<dyn TodoApi>>,
    db: Database,
    settings: AppSettings,
    summaries: Arc<SummaryFeed>,
    sidebar: SidebarState,
    // Keyed by ticket token so a retry never collides with a stale task.
    in_flight: HashMap<String, InFlight>,
    cmd_tx: mpsc::UnboundedSender<AppCmd>,
    cmd_rx: mpsc::UnboundedReceiver<AppCmd>,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    /// `db` holds the settings, whichever store keeps the chats.
    pub fn new(
        repo: Arc<dyn ChatRepository>,
        db: Database,
        backend: Arc<dyn ReplyBackend>,
        settings: AppSettings,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let sidebar = SidebarState::new(settings.viewport_width.unwrap_or(DEFAULT_VIEWPORT_WIDTH));
        let summaries = Arc::new(SummaryFeed::new());
        if let Err(e) = summaries.refresh_from(repo.as_ref()) {
            tracing::warn!("Failed to load chat list: {}", e);
        }

        tracing::info!("Using {} reply backend", backend.name());

        Self {
            store: ChatStore::new(repo),
            reconciler: Reconciler::new(),
            backend,
            todos: None,
            db,
            settings,
            summaries,
            sidebar,
            in_flight: HashMap::new(),
            cmd_tx,
            cmd_rx,
            events,
        }
    }

    pub fn with_todo_api(mut self, api: Arc<dyn TodoApi>) -> Self {
        self.todos = Some(api);
        self
    }

    pub fn summaries(&self) -> Arc<SummaryFeed> {
        self.summaries.clone()
    }

    pub fn sidebar(&self) -> SidebarState {
        self.sidebar.clone()
    }

    pub fn current_chat(&self) -> Option<&Chat> {
        self.store.current()
    }

    /// Drive the session until the inbox closes. Messages and reply
    /// completions are handled one at a time on the calling task.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<AppMsg>) {
        loop {
            tokio::select! {
                msg = inbox.recv() => match msg {
                    Some(msg) => self.update(msg),
                    None => break,
                },
                Some(cmd) = self.cmd_rx.recv() => self.update_cmd(cmd),
            }
        }

        self.shutdown();
        tracing::debug!("Session closed");
    }

    /// Stop every reply still in flight and store its message as aborted.
    pub fn shutdown(&mut self) {
        let flights: Vec<InFlight> = self.in_flight.drain().map(|(_, flight)| flight).collect();
        for flight in &flights {
            flight.cancel.cancel();
        }

        let mut chat_ids: Vec<&str> = flights.iter().map(|f| f.chat_id.as_str()).collect();
        chat_ids.sort_unstable();
        chat_ids.dedup();

        for chat_id in chat_ids {
            let mut chat = match self.store.latest(chat_id) {
                Ok(chat) => chat,
                Err(e) => {
                    tracing::error!("Cannot abort replies for chat {}: {}", chat_id, e);
                    continue;
                }
            };
            for flight in flights.iter().filter(|f| f.chat_id == chat_id) {
                if let Some(next) = self.reconciler.abort(&chat, &flight.message_id) {
                    chat = next;
                }
            }
            self.commit(chat);
        }
    }

    /// Wait for the next reply completion and apply it.
    pub async fn handle_next_command(&mut self) -> bool {
        match self.cmd_rx.recv().await {
            Some(cmd) => {
                self.update_cmd(cmd);
                true
            }
            None => false,
        }
    }

    pub fn update(&mut self, msg: AppMsg) {
        match msg {
            AppMsg::OpenChat(id) => self.open_chat(&id),
            AppMsg::NewChat(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                let (chat, first) = new_chat(text, &self.settings.username);
                tracing::info!("Starting chat {}", chat.id);
                if let Err(e) = self.store.open_new(chat) {
                    self.warn(e);
                }
                self.after_commit(None);
                self.sidebar.on_navigate();
                self.request_reply(&first.id);
            }
            AppMsg::SendMessage(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                let Some(chat) = self.store.current() else {
                    self.emit(AppEvent::Warning("Open or start a chat first".to_string()));
                    return;
                };
                let (next, message) = append_optimistic(chat, text, &self.settings.username, false);
                self.commit(next);
                self.request_reply(&message.id);
            }
            AppMsg::RetryReply(message_id) => self.request_reply(&message_id),
            AppMsg::AbortReply => self.abort_replies(),
            AppMsg::ListChats => {
                self.refresh_summaries();
                self.emit(AppEvent::Chats(self.summaries.snapshot()));
            }
            AppMsg::ToggleSidebar => {
                self.sidebar.toggle();
                self.emit(AppEvent::Sidebar(self.sidebar.view()));
            }
            AppMsg::ViewportResized(width) => {
                self.sidebar.set_viewport_width(width);
                self.settings.viewport_width = Some(width);
                self.save_settings();
                self.emit(AppEvent::Sidebar(self.sidebar.view()));
            }
            AppMsg::SetUsername(name) => {
                let name = name.trim();
                if !name.is_empty() {
                    self.settings.username = name.to_string();
                    self.save_settings();
                }
            }
            AppMsg::PinChat { chat_id, pinned } => {
                match self.store.repository().set_pinned(&chat_id, pinned) {
                    Ok(()) => {
                        self.refresh_summaries();
                        self.emit(AppEvent::Chats(self.summaries.snapshot()));
                    }
                    Err(e) => self.emit(AppEvent::Warning(format!("Could not pin chat: {}", e))),
                }
            }
            AppMsg::Todo(command) => self.request_todo(command),
            AppMsg::Export => match self.store.current() {
                Some(chat) => self.emit(AppEvent::Exported(export_to_markdown(chat))),
                None => self.emit(AppEvent::Warning("No chat to export".to_string())),
            },
        }
    }

    fn update_cmd(&mut self, cmd: AppCmd) {
        match cmd {
            AppCmd::ReplyFinished { ticket, outcome } => {
                self.in_flight.remove(&ticket.token);

                let current = match self.store.latest(&ticket.chat_id) {
                    Ok(chat) => chat,
                    Err(e) => {
                        tracing::error!("Cannot reconcile reply for chat {}: {}", ticket.chat_id, e);
                        return;
                    }
                };

                match self.reconciler.apply(&current, &ticket, outcome) {
                    Reconciliation::Completed { chat, reply } => {
                        tracing::debug!("Reply {} added to chat {}", reply.id, chat.id);
                        self.commit(chat);
                    }
                    Reconciliation::Failed { chat, error } => {
                        self.commit(chat);
                        if let ChatError::ReplyFailed { message_id, reason } = error {
                            self.emit(AppEvent::ReplyFailed { message_id, reason });
                        }
                    }
                    Reconciliation::Aborted { chat } => self.commit(chat),
                    Reconciliation::Discarded => {}
                }
            }
            AppCmd::TodoFinished(result) => match result {
                Ok(event) => self.emit(AppEvent::Todo(event)),
                Err(e) => {
                    tracing::error!("Todo request failed: {}", e);
                    self.emit(AppEvent::Warning(format!("Todo request failed: {}", e)));
                }
            },
        }
    }

    fn open_chat(&mut self, id: &str) {
        match self.store.load(id) {
            Ok(chat) => {
                let settled = self.reconciler.settle_orphans(chat);
                self.sidebar.on_navigate();
                match settled {
                    Some(chat) => self.commit(chat),
                    None => self.after_commit(Some(id)),
                }
            }
            Err(e) => {
                if !matches!(e, ChatError::NotFound(_)) {
                    tracing::error!("Failed to open chat {}: {}", id, e);
                    self.warn(e);
                } else {
                    tracing::info!("Chat {} not found, redirecting", id);
                }
                self.store.close();
                self.emit(AppEvent::Redirect {
                    missing_id: id.to_string(),
                });
            }
        }
    }

    fn request_reply(&mut self, message_id: &str) {
        let Some(chat) = self.store.current() else {
            return;
        };

        let (pending, ticket) = match self.reconciler.dispatch(chat, message_id, &self.settings.username) {
            Ok(dispatched) => dispatched,
            Err(e) => {
                tracing::warn!("Not requesting reply: {}", e);
                self.warn(e);
                return;
            }
        };
        self.commit(pending);

        let token = CancellationToken::new();
        self.in_flight.insert(
            ticket.token.clone(),
            InFlight {
                chat_id: ticket.chat_id.clone(),
                message_id: ticket.message_id.clone(),
                cancel: token.clone(),
            },
        );

        let backend = self.backend.clone();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let outcome = dispatch_reply(backend, ticket.request.clone(), token).await;
            if cmd_tx.send(AppCmd::ReplyFinished { ticket, outcome }).is_err() {
                tracing::debug!("Session gone before reply finished");
            }
        });
    }

    fn abort_replies(&mut self) {
        let Some(current) = self.store.current() else {
            return;
        };

        let pending: Vec<String> = current
            .messages
            .iter()
            .filter(|m| m.status == MessageStatus::Pending)
            .map(|m| m.id.clone())
            .collect();
        if pending.is_empty() {
            return;
        }

        let mut chat = current.clone();
        for message_id in &pending {
            if let Some(next) = self.reconciler.abort(&chat, message_id) {
                chat = next;
            }
        }
        for flight in self.in_flight.values() {
            if flight.chat_id == chat.id && pending.contains(&flight.message_id) {
                flight.cancel.cancel();
            }
        }
        self.commit(chat);
    }

    fn request_todo(&mut self, command: TodoCommand) {
        let Some(api) = self.todos.clone() else {
            self.emit(AppEvent::Warning("Todo lists are not available".to_string()));
            return;
        };

        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let result = run_todo(api, command).await;
            if cmd_tx.send(AppCmd::TodoFinished(result)).is_err() {
                tracing::debug!("Session gone before todo request finished");
            }
        });
    }

    fn save_settings(&self) {
        if let Err(e) = SettingsService::save(&self.db, &self.settings) {
            tracing::error!("Failed to save settings: {}", e);
            self.emit(AppEvent::Warning(format!("Settings not saved: {}", e)));
        }
    }

    fn commit(&mut self, chat: Chat) {
        let id = chat.id.clone();
        if let Err(e) = self.store.commit(chat) {
            tracing::warn!("{}", e);
            self.warn(e);
        }
        self.after_commit(Some(&id));
    }

    fn after_commit(&mut self, id: Option<&str>) {
        self.refresh_summaries();
        if let Some(current) = self.store.current() {
            if id.map_or(true, |id| id == current.id) {
                self.emit(AppEvent::ChatUpdated(current.clone()));
            }
        }
    }

    fn refresh_summaries(&self) {
        if let Err(e) = self.summaries.refresh_from(self.store.repository().as_ref()) {
            tracing::warn!("Failed to refresh chat list: {}", e);
        }
    }

    fn warn(&self, error: ChatError) {
        self.emit(AppEvent::Warning(error.to_string()));
    }

    fn emit(&self, event: AppEvent) {
        let _ = self.events.send(event);
    }
}
