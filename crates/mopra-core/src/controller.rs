//! The chat controller: every piece of client state and every user action.
//!
//! The controller is driven from a single UI loop. Actions come in through
//! [`ChatController::dispatch`]; network work is spawned onto tokio and its
//! result is posted back as a [`Completion`], which the loop hands to
//! [`ChatController::apply`]. State is therefore only ever mutated on the
//! loop, between events.

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{Answer, MopraClient};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::history::ConversationHistory;
use crate::memory::{MemoryEntry, MemoryPanel, CLEAR_PROMPT};
use crate::model;
use crate::platform::SearchPlatform;
use crate::search::{SearchPanel, SearchView};
use crate::state::{ChatMessage, ChatRole, SYSTEM_MODEL};
use crate::status::{Status, StatusBadge, STATUS_RESET_DELAY};
use crate::storage::KeyValueStore;

pub const HISTORY_PLACEHOLDER: &str = "Start chatting with your local AI...";
pub const PENDING_TEXT: &str = "Thinking...";
pub const STOPPED_TEXT: &str = "Response stopped by user";
pub const CLEAR_HISTORY_PROMPT: &str = "Clear all chat history?";

/// Everything a user can ask the client to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    SendPrompt(String),
    ClearHistory,
    /// Answer "yes" to the open confirmation
    Confirm,
    /// Answer "no" to the open confirmation
    Cancel,
    /// Cancel the local request, then stop the backend
    Stop,
    StopAll,
    OptimizeResources,
    SelectModel(String),
    OpenSearch,
    CloseSearch,
    SubmitSearch,
    SelectPlatform(SearchPlatform),
    NextPlatform,
    OpenMemory,
    CloseMemory,
    RefreshMemory,
    ClearMemory,
    DismissAlert,
}

/// Result of background work, applied on the UI loop
#[derive(Debug)]
pub enum Completion {
    Query { id: u64, result: ApiResult<Answer> },
    StopAll(ApiResult<()>),
    Optimize(ApiResult<()>),
    Search { platform: SearchPlatform, result: ApiResult<String> },
    MemoryLoaded(ApiResult<Vec<MemoryEntry>>),
    MemoryCleared(ApiResult<()>),
    StatusReset { generation: u64 },
}

/// Destructive actions waiting on a yes/no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    ClearHistory,
    ClearMemory,
}

impl Confirmation {
    pub fn prompt(&self) -> &'static str {
        match self {
            Confirmation::ClearHistory => CLEAR_HISTORY_PROMPT,
            Confirmation::ClearMemory => CLEAR_PROMPT,
        }
    }
}

/// What the transcript area should show
#[derive(Debug, PartialEq, Eq)]
pub enum Transcript<'a> {
    Placeholder(&'static str),
    Messages {
        messages: &'a [ChatMessage],
        /// Show the "Thinking..." row after the messages
        pending: bool,
    },
}

/// The live chat request
#[derive(Debug)]
struct InFlight {
    id: u64,
    token: CancellationToken,
}

pub struct ChatController {
    client: MopraClient,
    store: Box<dyn KeyValueStore>,
    completions: UnboundedSender<Completion>,

    history: ConversationHistory,
    selected_model: String,
    status: StatusBadge,
    in_flight: Option<InFlight>,
    next_request_id: u64,

    search: SearchPanel,
    memory: MemoryPanel,
    confirmation: Option<Confirmation>,
    alert: Option<String>,
}

impl ChatController {
    /// Restore persisted state and get ready to serve actions.
    ///
    /// Unreadable saved state is logged and replaced by defaults rather than
    /// keeping the client from starting.
    pub fn new(
        client: MopraClient,
        store: Box<dyn KeyValueStore>,
        config: &Config,
        completions: UnboundedSender<Completion>,
    ) -> Self {
        let history = ConversationHistory::load(store.as_ref()).unwrap_or_else(|e| {
            warn!("Discarding saved chat history: {:#}", e);
            ConversationHistory::new()
        });

        let selected_model = model::load_selected(store.as_ref(), config.default_model())
            .unwrap_or_else(|e| {
                warn!("Could not read saved model selection: {:#}", e);
                model::DEFAULT_MODEL.to_string()
            });

        info!(
            messages = history.len(),
            model = %selected_model,
            server = client.base_url(),
            "chat controller ready"
        );

        Self {
            client,
            store,
            completions,
            history,
            selected_model,
            status: StatusBadge::new(),
            in_flight: None,
            next_request_id: 1,
            search: SearchPanel::new(config.search_platform()),
            memory: MemoryPanel::default(),
            confirmation: None,
            alert: None,
        }
    }

    // Accessors

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn model_label(&self) -> &str {
        model::display_name(&self.selected_model)
    }

    pub fn status(&self) -> Status {
        self.status.status()
    }

    pub fn status_badge(&self) -> &StatusBadge {
        &self.status
    }

    /// Whether the stop control is usable
    pub fn can_stop(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn search(&self) -> &SearchPanel {
        &self.search
    }

    /// Mutable access for the front end's text editing of the query field
    pub fn search_mut(&mut self) -> &mut SearchPanel {
        &mut self.search
    }

    pub fn memory(&self) -> &MemoryPanel {
        &self.memory
    }

    pub fn confirmation(&self) -> Option<Confirmation> {
        self.confirmation
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn transcript(&self) -> Transcript<'_> {
        if self.history.is_empty() {
            Transcript::Placeholder(HISTORY_PLACEHOLDER)
        } else {
            Transcript::Messages {
                messages: self.history.messages(),
                pending: self.in_flight.is_some(),
            }
        }
    }

    // Dispatch

    pub fn dispatch(&mut self, action: UiAction) {
        debug!(?action, "dispatch");
        match action {
            UiAction::SendPrompt(text) => {
                let model = self.selected_model.clone();
                self.send_prompt(&text, &model);
            }
            UiAction::ClearHistory => self.confirmation = Some(Confirmation::ClearHistory),
            UiAction::Confirm => self.confirm(),
            UiAction::Cancel => self.confirmation = None,
            UiAction::Stop => self.stop(),
            UiAction::StopAll => self.stop_all(),
            UiAction::OptimizeResources => {
                let model = self.selected_model.clone();
                self.optimize_resources(&model);
            }
            UiAction::SelectModel(id) => {
                self.select_model(&id);
            }
            UiAction::OpenSearch => self.search.open(),
            UiAction::CloseSearch => self.search.close(),
            UiAction::SubmitSearch => {
                self.submit_search();
            }
            UiAction::SelectPlatform(platform) => self.search.select_platform(platform),
            UiAction::NextPlatform => self.search.next_platform(),
            UiAction::OpenMemory => {
                self.memory.open();
                self.load_memory();
            }
            UiAction::CloseMemory => self.memory.close(),
            UiAction::RefreshMemory => self.load_memory(),
            UiAction::ClearMemory => self.confirmation = Some(Confirmation::ClearMemory),
            UiAction::DismissAlert => self.alert = None,
        }
    }

    pub fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Query { id, result } => self.finish_query(id, result),
            Completion::StopAll(result) => self.finish_stop_all(result),
            Completion::Optimize(result) => self.finish_optimize(result),
            Completion::Search { .. } if !self.search.open => {
                debug!("dropping search result for a closed panel");
            }
            Completion::Search { platform, result } => match result {
                Ok(content) => self.search.view = SearchView::Results { platform, content },
                Err(e) => {
                    debug!("online search failed: {}", e);
                    self.search.view = SearchView::Error(format!("Error: {}", e));
                }
            },
            Completion::MemoryLoaded(result) => match result {
                Ok(entries) => self.memory.show_entries(entries),
                Err(e) => self.memory.show_error(e),
            },
            Completion::MemoryCleared(result) => match result {
                Ok(()) => {
                    info!("backend memory cleared");
                    self.load_memory();
                }
                Err(e) => self.alert = Some(format!("Error: {}", e)),
            },
            Completion::StatusReset { generation } => {
                self.status.apply_reset(generation);
            }
        }
    }

    // Conversation

    fn append(&mut self, role: ChatRole, content: impl Into<String>, model: impl Into<String>) {
        self.history.append(role, content, model);
        self.persist_history();
    }

    fn persist_history(&mut self) {
        if let Err(e) = self.history.save(self.store.as_mut()) {
            warn!("Failed to save chat history: {:#}", e);
        }
    }

    fn confirm(&mut self) {
        match self.confirmation.take() {
            Some(Confirmation::ClearHistory) => {
                info!(messages = self.history.len(), "clearing chat history");
                self.history.clear();
                self.persist_history();
            }
            Some(Confirmation::ClearMemory) => self.clear_memory(),
            None => {}
        }
    }

    fn select_model(&mut self, id: &str) -> bool {
        if !model::is_known(id) {
            warn!(model = id, "ignoring unknown model");
            return false;
        }

        self.selected_model = id.to_string();
        if let Err(e) = model::save_selected(self.store.as_mut(), id) {
            warn!("Failed to save model selection: {:#}", e);
        }
        self.status.set(Status::LoadingModel);
        true
    }

    // Requests

    /// Send a prompt, replacing any request still in flight.
    ///
    /// Returns `false` without doing anything when the prompt is blank.
    pub fn send_prompt(&mut self, text: &str, model_id: &str) -> bool {
        let prompt = text.trim();
        if prompt.is_empty() {
            return false;
        }

        if let Some(previous) = self.in_flight.take() {
            debug!(id = previous.id, "superseding in-flight request");
            previous.token.cancel();
        }

        let id = self.next_request_id;
        self.next_request_id += 1;
        let token = CancellationToken::new();
        self.in_flight = Some(InFlight {
            id,
            token: token.clone(),
        });

        self.append(ChatRole::User, prompt, model::base_id(model_id));
        self.status.set(Status::Processing);

        let client = self.client.clone();
        let tx = self.completions.clone();
        let prompt = prompt.to_string();
        let model_id = model_id.to_string();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(ApiError::Cancelled),
                result = client.query(&prompt, &model_id) => result,
            };
            let _ = tx.send(Completion::Query { id, result });
        });

        true
    }

    fn finish_query(&mut self, id: u64, result: ApiResult<Answer>) {
        let live = self.in_flight.as_ref().is_some_and(|r| r.id == id);
        if live {
            self.in_flight = None;
        }
        // A request that is no longer live was cancelled, whatever raced in.
        // Whoever cancelled it owns the badge.
        let result = if live { result } else { Err(ApiError::Cancelled) };

        match result {
            Ok(answer) => {
                self.status.set(Status::Ready);
                let model = answer
                    .model
                    .unwrap_or_else(|| model::base_id(&self.selected_model).to_string());
                self.append(ChatRole::Ai, answer.content, model);
            }
            Err(e) if e.is_cancelled() => {
                debug!(id, "request cancelled");
                if live {
                    self.status.set(Status::Stopped);
                }
                self.append(ChatRole::Ai, STOPPED_TEXT, SYSTEM_MODEL);
            }
            Err(e) => {
                warn!(id, "chat request failed: {}", e);
                self.status.set(Status::Error);
                self.append(ChatRole::Ai, format!("Error: {}", e), SYSTEM_MODEL);
            }
        }
    }

    /// The stop control: drop the local request now, then halt the backend.
    fn stop(&mut self) {
        if let Some(request) = self.in_flight.take() {
            request.token.cancel();
        }
        self.stop_all();
    }

    pub fn stop_all(&mut self) {
        self.status.set(Status::Stopping);

        let client = self.client.clone();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = client.stop_all().await;
            let _ = tx.send(Completion::StopAll(result));
        });
    }

    fn finish_stop_all(&mut self, result: ApiResult<()>) {
        match result {
            Ok(()) => {
                if let Some(request) = self.in_flight.take() {
                    request.token.cancel();
                }
                self.set_transient(Status::Stopped);
            }
            Err(e) => {
                warn!("Failed to stop models: {}", e);
                self.status.set(Status::StopFailed);
            }
        }
    }

    pub fn optimize_resources(&mut self, current_model: &str) {
        self.status.set(Status::Optimizing);

        let client = self.client.clone();
        let tx = self.completions.clone();
        let current_model = current_model.to_string();
        tokio::spawn(async move {
            let result = client.optimize_ram(&current_model).await;
            let _ = tx.send(Completion::Optimize(result));
        });
    }

    fn finish_optimize(&mut self, result: ApiResult<()>) {
        match result {
            Ok(()) => self.set_transient(Status::Optimized),
            Err(e) => {
                warn!("RAM optimization failed: {}", e);
                self.status.set(Status::OptimizationFailed);
            }
        }
    }

    /// Set a status that reverts to Ready unless something else happens first.
    fn set_transient(&mut self, status: Status) {
        let tx = self.completions.clone();
        self.status.set_with_reset(status, STATUS_RESET_DELAY, move |generation| {
            let _ = tx.send(Completion::StatusReset { generation });
        });
    }

    // Panels

    /// Submit the search panel's query. Returns `false` when it is blank.
    pub fn submit_search(&mut self) -> bool {
        let Some(query) = self.search.submittable_query() else {
            return false;
        };
        let platform = self.search.platform;
        self.search.view = SearchView::Searching;

        let client = self.client.clone();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = client.online_search(&query, platform).await;
            let _ = tx.send(Completion::Search { platform, result });
        });
        true
    }

    pub fn load_memory(&mut self) {
        self.memory.begin_loading();

        let client = self.client.clone();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = client.memory().await;
            let _ = tx.send(Completion::MemoryLoaded(result));
        });
    }

    fn clear_memory(&mut self) {
        let client = self.client.clone();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let result = client.clear_memory().await;
            let _ = tx.send(Completion::MemoryCleared(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HISTORY_KEY;
    use crate::memory::MemoryView;
    use crate::model::SELECTED_MODEL_KEY;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use wiremock::matchers::{any, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn controller(base_url: &str) -> (ChatController, UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctl = ChatController::new(
            MopraClient::new(base_url),
            Box::new(MemoryStore::new()),
            &Config::new(),
            tx,
        );
        (ctl, rx)
    }

    /// Wait for the next completion and apply it, as the UI loop would.
    async fn settle(ctl: &mut ChatController, rx: &mut UnboundedReceiver<Completion>) {
        let completion = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for completion")
            .expect("completion channel closed");
        ctl.apply(completion);
    }

    fn contents(ctl: &ChatController) -> Vec<(ChatRole, String, String)> {
        ctl.history()
            .messages()
            .iter()
            .map(|m| (m.role, m.content.clone(), m.model.clone()))
            .collect()
    }

    fn persisted(ctl: &ChatController) -> Vec<ChatMessage> {
        ConversationHistory::load(ctl.store()).unwrap().messages().to_vec()
    }

    #[tokio::test]
    async fn test_blank_prompt_is_ignored() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::SendPrompt("   \n\t".to_string()));
        assert!(!ctl.send_prompt("", "phi3"));

        assert!(ctl.history().is_empty());
        assert!(!ctl.can_stop());
        assert_eq!(ctl.status(), Status::Ready);
        assert!(rx.try_recv().is_err());
        assert!(ctl.store().get(HISTORY_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hello_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .and(body_partial_json(json!({"prompt": "Hello", "model": "phi3"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "Hi there",
                "model": "phi3"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::SendPrompt("  Hello ".to_string()));

        // Optimistic user message, pending row, processing badge
        assert_eq!(contents(&ctl), vec![(ChatRole::User, "Hello".to_string(), "phi3".to_string())]);
        assert_eq!(
            ctl.transcript(),
            Transcript::Messages {
                messages: ctl.history().messages(),
                pending: true
            }
        );
        assert_eq!(ctl.status(), Status::Processing);
        assert!(ctl.can_stop());
        assert_eq!(persisted(&ctl), ctl.history().messages());

        settle(&mut ctl, &mut rx).await;

        assert_eq!(
            contents(&ctl),
            vec![
                (ChatRole::User, "Hello".to_string(), "phi3".to_string()),
                (ChatRole::Ai, "Hi there".to_string(), "phi3".to_string()),
            ]
        );
        assert_eq!(ctl.status(), Status::Ready);
        assert!(!ctl.can_stop());
        assert!(matches!(ctl.transcript(), Transcript::Messages { pending: false, .. }));
        assert_eq!(persisted(&ctl), ctl.history().messages());
    }

    #[tokio::test]
    async fn test_answer_without_model_uses_selected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "ok"})))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::SendPrompt("ping".to_string()));
        settle(&mut ctl, &mut rx).await;

        assert_eq!(ctl.history().last().unwrap().model, "phi3");
    }

    #[tokio::test]
    async fn test_error_payload_appends_system_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "Failed to load model: phi3"})))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::SendPrompt("Hello".to_string()));
        settle(&mut ctl, &mut rx).await;

        let ai: Vec<_> = ctl
            .history()
            .messages()
            .iter()
            .filter(|m| m.role == ChatRole::Ai)
            .collect();
        assert_eq!(ai.len(), 1);
        assert_eq!(ai[0].content, "Error: Failed to load model: phi3");
        assert!(ai[0].is_system());
        assert_eq!(ctl.status(), Status::Error);
    }

    #[tokio::test]
    async fn test_http_failure_appends_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::SendPrompt("Hello".to_string()));
        settle(&mut ctl, &mut rx).await;

        let last = ctl.history().last().unwrap();
        assert_eq!(last.content, "Error: HTTP error! status: 503");
        assert_eq!(last.model, SYSTEM_MODEL);
        assert_eq!(ctl.status(), Status::Error);
    }

    #[tokio::test]
    async fn test_second_request_cancels_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .and(body_partial_json(json!({"prompt": "first"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"content": "too late", "model": "phi3"}))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .and(body_partial_json(json!({"prompt": "second"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "fast", "model": "phi3"})))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::SendPrompt("first".to_string()));
        ctl.dispatch(UiAction::SendPrompt("second".to_string()));
        assert!(ctl.can_stop());

        // The cancelled request reports immediately; it must not touch the live badge
        settle(&mut ctl, &mut rx).await;
        assert_eq!(ctl.history().last().unwrap().content, STOPPED_TEXT);
        assert_eq!(ctl.status(), Status::Processing);
        assert!(ctl.can_stop());

        settle(&mut ctl, &mut rx).await;
        assert_eq!(
            contents(&ctl),
            vec![
                (ChatRole::User, "first".to_string(), "phi3".to_string()),
                (ChatRole::User, "second".to_string(), "phi3".to_string()),
                (ChatRole::Ai, STOPPED_TEXT.to_string(), SYSTEM_MODEL.to_string()),
                (ChatRole::Ai, "fast".to_string(), "phi3".to_string()),
            ]
        );
        assert!(!contents(&ctl).iter().any(|(_, content, _)| content == "too late"));
        assert_eq!(ctl.status(), Status::Ready);
        assert!(!ctl.can_stop());
    }

    #[tokio::test]
    async fn test_stop_cancels_and_halts_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"content": "never", "model": "phi3"}))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/stop-all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success", "terminated": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::SendPrompt("Hello".to_string()));
        ctl.dispatch(UiAction::Stop);

        assert!(!ctl.can_stop());
        assert_eq!(ctl.status(), Status::Stopping);

        settle(&mut ctl, &mut rx).await;
        settle(&mut ctl, &mut rx).await;

        assert_eq!(
            contents(&ctl),
            vec![
                (ChatRole::User, "Hello".to_string(), "phi3".to_string()),
                (ChatRole::Ai, STOPPED_TEXT.to_string(), SYSTEM_MODEL.to_string()),
            ]
        );
        assert_eq!(ctl.status(), Status::Stopped);
        assert_eq!(persisted(&ctl), ctl.history().messages());
    }

    #[tokio::test]
    async fn test_stop_all_success_cancels_live_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/query"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/stop-all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::SendPrompt("Hello".to_string()));
        ctl.dispatch(UiAction::StopAll);
        assert!(ctl.can_stop());

        // stop-all answers first, then the cancelled query reports in
        settle(&mut ctl, &mut rx).await;
        assert!(!ctl.can_stop());
        assert_eq!(ctl.status(), Status::Stopped);
        assert!(ctl.status_badge().has_pending_reset());

        settle(&mut ctl, &mut rx).await;
        assert_eq!(ctl.history().last().unwrap().content, STOPPED_TEXT);
        // The late cancellation leaves the scheduled revert alone
        assert_eq!(ctl.status(), Status::Stopped);
        assert!(ctl.status_badge().has_pending_reset());

        settle(&mut ctl, &mut rx).await;
        assert_eq!(ctl.status(), Status::Ready);
    }

    #[tokio::test]
    async fn test_stop_all_failure_is_not_a_chat_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/stop-all"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"status": "error", "error": "denied"})))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::StopAll);
        settle(&mut ctl, &mut rx).await;

        assert_eq!(ctl.status(), Status::StopFailed);
        assert!(ctl.history().is_empty());
    }

    #[tokio::test]
    async fn test_optimize_success_then_reset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/optimize-ram"))
            .and(body_partial_json(json!({"current_model": "phi3"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::OptimizeResources);
        assert_eq!(ctl.status(), Status::Optimizing);

        settle(&mut ctl, &mut rx).await;
        assert_eq!(ctl.status(), Status::Optimized);

        // The scheduled revert arrives through the same channel
        settle(&mut ctl, &mut rx).await;
        assert_eq!(ctl.status(), Status::Ready);
    }

    #[tokio::test]
    async fn test_optimize_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/optimize-ram"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "No model specified"})))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::OptimizeResources);
        settle(&mut ctl, &mut rx).await;

        assert_eq!(ctl.status(), Status::OptimizationFailed);
        assert!(!ctl.status_badge().has_pending_reset());
    }

    #[tokio::test]
    async fn test_stale_reset_does_not_clobber_newer_status() {
        let (mut ctl, _rx) = controller("http://127.0.0.1:9");
        ctl.apply(Completion::Optimize(Ok(())));
        assert_eq!(ctl.status(), Status::Optimized);
        let stale = ctl.status_badge().generation();

        ctl.dispatch(UiAction::SelectModel("phi3".to_string()));
        assert_eq!(ctl.status(), Status::LoadingModel);

        ctl.apply(Completion::StatusReset { generation: stale });
        assert_eq!(ctl.status(), Status::LoadingModel);
    }

    #[tokio::test]
    async fn test_clear_history_requires_confirmation() {
        let (mut ctl, _rx) = controller("http://127.0.0.1:9");
        ctl.apply(Completion::Query {
            id: 99,
            result: Err(ApiError::Cancelled),
        });
        assert_eq!(ctl.history().len(), 1);

        ctl.dispatch(UiAction::ClearHistory);
        assert_eq!(ctl.confirmation(), Some(Confirmation::ClearHistory));
        assert_eq!(ctl.confirmation().unwrap().prompt(), CLEAR_HISTORY_PROMPT);
        ctl.dispatch(UiAction::Cancel);
        assert_eq!(ctl.confirmation(), None);
        assert_eq!(ctl.history().len(), 1);

        ctl.dispatch(UiAction::ClearHistory);
        ctl.dispatch(UiAction::Confirm);
        assert!(ctl.history().is_empty());
        assert_eq!(ctl.transcript(), Transcript::Placeholder(HISTORY_PLACEHOLDER));
        assert!(persisted(&ctl).is_empty());
        assert_eq!(ctl.store().get(HISTORY_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_restores_persisted_state() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut store = MemoryStore::new();
        let mut saved = ConversationHistory::new();
        saved.append(ChatRole::User, "earlier", "phi3");
        saved.save(&mut store).unwrap();
        store.set(SELECTED_MODEL_KEY, "phi3").unwrap();

        let ctl = ChatController::new(
            MopraClient::new("http://127.0.0.1:9"),
            Box::new(store),
            &Config::new(),
            tx,
        );
        assert_eq!(ctl.history().messages(), saved.messages());
        assert_eq!(ctl.selected_model(), "phi3");
        assert_eq!(ctl.model_label(), "Phi-3");
    }

    #[tokio::test]
    async fn test_corrupt_history_starts_empty() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut store = MemoryStore::new();
        store.set(HISTORY_KEY, "not json").unwrap();

        let ctl = ChatController::new(
            MopraClient::new("http://127.0.0.1:9"),
            Box::new(store),
            &Config::new(),
            tx,
        );
        assert!(ctl.history().is_empty());
    }

    #[tokio::test]
    async fn test_select_model() {
        let (mut ctl, _rx) = controller("http://127.0.0.1:9");

        ctl.dispatch(UiAction::SelectModel("gpt-17".to_string()));
        assert_eq!(ctl.status(), Status::Ready);
        assert!(ctl.store().get(SELECTED_MODEL_KEY).unwrap().is_none());

        ctl.dispatch(UiAction::SelectModel("phi3".to_string()));
        assert_eq!(ctl.status(), Status::LoadingModel);
        assert_eq!(ctl.store().get(SELECTED_MODEL_KEY).unwrap().as_deref(), Some("phi3"));
    }

    #[tokio::test]
    async fn test_search_flow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/online-search"))
            .and(body_partial_json(json!({"query": "tokio", "ai_platform": "gemini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "a\nb"})))
            .expect(1)
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::OpenSearch);
        assert!(ctl.search().open);

        // Blank query does nothing
        ctl.search_mut().query = "   ".to_string();
        ctl.dispatch(UiAction::SubmitSearch);
        assert_eq!(ctl.search().view, SearchView::Placeholder);

        ctl.dispatch(UiAction::SelectPlatform(SearchPlatform::Claude));
        ctl.dispatch(UiAction::NextPlatform);
        assert_eq!(ctl.search().platform, SearchPlatform::Gemini);

        ctl.search_mut().query = " tokio ".to_string();
        ctl.dispatch(UiAction::SubmitSearch);
        assert_eq!(ctl.search().view, SearchView::Searching);

        settle(&mut ctl, &mut rx).await;
        assert_eq!(
            ctl.search().view,
            SearchView::Results {
                platform: SearchPlatform::Gemini,
                content: "a\nb".to_string()
            }
        );

        ctl.dispatch(UiAction::CloseSearch);
        assert!(!ctl.search().open);
        assert!(ctl.search().query.is_empty());
        assert_eq!(ctl.search().view, SearchView::Placeholder);
    }

    #[tokio::test]
    async fn test_search_result_after_close_is_dropped() {
        let (mut ctl, _rx) = controller("http://127.0.0.1:9");
        ctl.dispatch(UiAction::OpenSearch);
        ctl.dispatch(UiAction::CloseSearch);

        ctl.apply(Completion::Search {
            platform: SearchPlatform::ChatGpt,
            result: Ok("late".to_string()),
        });
        ctl.dispatch(UiAction::OpenSearch);
        assert_eq!(ctl.search().view, SearchView::Placeholder);
    }

    #[tokio::test]
    async fn test_search_error_is_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/online-search"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "OpenAI API key not configured"})))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::OpenSearch);
        ctl.search_mut().query = "rust".to_string();
        ctl.dispatch(UiAction::SubmitSearch);
        settle(&mut ctl, &mut rx).await;

        assert_eq!(
            ctl.search().view,
            SearchView::Error("Error: OpenAI API key not configured".to_string())
        );
        assert!(ctl.history().is_empty());
    }

    #[tokio::test]
    async fn test_memory_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/memory"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "memory": [
                    {"prompt": "one", "response": "1", "timestamp": "2024-05-01T10:00:00"},
                    {"prompt": "two", "response": "2", "timestamp": "2024-05-01T10:01:00"},
                    {"prompt": "three", "response": "3\n3", "timestamp": "2024-05-01T10:02:00"}
                ]
            })))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::OpenMemory);
        assert!(ctl.memory().open);
        assert_eq!(ctl.memory().view, MemoryView::Loading);

        settle(&mut ctl, &mut rx).await;
        let MemoryView::Entries(entries) = &ctl.memory().view else {
            panic!("expected entries, got {:?}", ctl.memory().view);
        };
        let prompts: Vec<&str> = entries.iter().map(|e| e.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["three", "two", "one"]);

        ctl.dispatch(UiAction::CloseMemory);
        assert!(!ctl.memory().open);
    }

    #[tokio::test]
    async fn test_clear_memory_reloads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/memory/clear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/memory"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"memory": []})))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::ClearMemory);
        assert_eq!(ctl.confirmation(), Some(Confirmation::ClearMemory));
        ctl.dispatch(UiAction::Confirm);

        settle(&mut ctl, &mut rx).await;
        assert_eq!(ctl.memory().view, MemoryView::Loading);
        settle(&mut ctl, &mut rx).await;
        assert_eq!(ctl.memory().view, MemoryView::Empty);
        assert_eq!(ctl.alert(), None);
    }

    #[tokio::test]
    async fn test_clear_memory_declined_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::ClearMemory);
        ctl.dispatch(UiAction::Cancel);
        assert_eq!(ctl.confirmation(), None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_memory_error_raises_alert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/memory/clear"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"status": "error", "error": "disk full"})))
            .mount(&server)
            .await;

        let (mut ctl, mut rx) = controller(&server.uri());
        ctl.dispatch(UiAction::ClearMemory);
        ctl.dispatch(UiAction::Confirm);
        settle(&mut ctl, &mut rx).await;

        assert_eq!(ctl.alert(), Some("Error: disk full"));
        ctl.dispatch(UiAction::DismissAlert);
        assert_eq!(ctl.alert(), None);
    }
}
