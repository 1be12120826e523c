//! Harvest state machine and dispatch loop

use std::fs;
use std::io::ErrorKind;
use std::time::Duration;

use reap_client::{Request, Response, Transport, Update};

use crate::config::HarvestConfig;
use crate::error::{Error, Result};
use crate::pending::{Handler, PendingTable};
use crate::prompt::CredentialPrompt;
use crate::writer::ChatWriter;

/// How long one poll waits for the next inbound event
const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// One conversation on the work stack
#[derive(Debug)]
struct ConversationTask {
    id: i64,
    /// Id of the oldest message seen so far; 0 = start from the newest
    cursor: i64,
    /// Messages received for this conversation so far
    harvested: i64,
}

/// Totals for a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestSummary {
    pub conversations: usize,
    pub messages: i64,
}

/// Drives the messaging client from authorization through conversation
/// enumeration and backward pagination until every conversation is
/// serialized.
///
/// The engine is strictly sequential: each completion issues at most the
/// next request, so there is never more than one tracked request in flight.
/// A transport that stops answering therefore stalls the run indefinitely;
/// that is a property of the collaborator's contract, deliberately not
/// papered over with retries here.
pub struct Harvester {
    config: HarvestConfig,
    transport: Box<dyn Transport>,
    prompt: Box<dyn CredentialPrompt>,
    pending: PendingTable,
    self_id: i64,
    stack: Vec<ConversationTask>,
    writer: Option<ChatWriter>,
    conversations_done: usize,
    messages_total: i64,
    running: bool,
}

impl Harvester {
    /// Build a harvester over a validated configuration. Fails before any
    /// transport interaction if the configuration is unusable.
    pub fn new(
        config: HarvestConfig,
        transport: Box<dyn Transport>,
        prompt: Box<dyn CredentialPrompt>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            prompt,
            pending: PendingTable::new(),
            self_id: 0,
            stack: Vec::new(),
            writer: None,
            conversations_done: 0,
            messages_total: 0,
            running: false,
        })
    }

    /// Run the dispatch loop to completion: poll the transport, route each
    /// inbound event, stop once the last conversation is exhausted.
    pub async fn run(&mut self) -> Result<HarvestSummary> {
        // quiet the client library and kick it so authorization updates
        // start flowing
        self.pending
            .send_untracked(self.transport.as_mut(), Request::SetVerbosity { level: 0 })
            .await?;
        self.pending
            .send_untracked(self.transport.as_mut(), Request::Probe)
            .await?;

        self.running = true;
        while self.running {
            let Some(inbound) = self.transport.poll(POLL_TIMEOUT).await? else {
                continue;
            };
            match inbound {
                reap_client::Inbound::Update { update } => self.on_update(update).await?,
                reap_client::Inbound::Response {
                    request_id,
                    response,
                } => self.on_response(request_id, response).await?,
            }
        }

        Ok(HarvestSummary {
            conversations: self.conversations_done,
            messages: self.messages_total,
        })
    }

    /// React to an unsolicited state update. The order of authorization
    /// steps is dictated entirely by which update the client delivers next.
    async fn on_update(&mut self, update: Update) -> Result<()> {
        match update {
            Update::AuthWaitParams => {
                let params = self.config.client_params.clone();
                self.pending
                    .send_untracked(
                        self.transport.as_mut(),
                        Request::SetClientParams { params },
                    )
                    .await?;
            }
            Update::AuthWaitPhone => {
                let phone = self.prompt.phone()?;
                self.pending
                    .send_untracked(self.transport.as_mut(), Request::SubmitPhone { phone })
                    .await?;
            }
            Update::AuthWaitCode => {
                let code = self.prompt.code()?;
                self.pending
                    .send_untracked(self.transport.as_mut(), Request::SubmitCode { code })
                    .await?;
            }
            Update::AuthWaitPassword => {
                let password = self.prompt.password()?;
                self.pending
                    .send_untracked(
                        self.transport.as_mut(),
                        Request::SubmitPassword { password },
                    )
                    .await?;
            }
            Update::AuthReady => {
                tracing::info!("authorization complete");
                self.pending
                    .register(self.transport.as_mut(), Request::GetSelf, Handler::SelfInfo)
                    .await?;
                self.pending
                    .register(
                        self.transport.as_mut(),
                        Request::ListConversations { limit: i32::MAX },
                        Handler::ConversationList,
                    )
                    .await?;
            }
            Update::AuthClosed => return Err(Error::Closed),
            Update::Other => {}
        }
        Ok(())
    }

    /// Route a correlated response through the pending table. A response
    /// with no live entry is dropped; entries dispatch exactly once.
    async fn on_response(&mut self, request_id: u64, response: Response) -> Result<()> {
        let Some(pending) = self.pending.take(request_id) else {
            tracing::trace!(request_id, "response without a pending entry, dropped");
            return Ok(());
        };
        tracing::trace!(request_id, request = pending.request.kind(), "dispatching");

        match pending.handler {
            Handler::SelfInfo => self.on_self_info(response),
            Handler::ConversationList => self.on_conversation_list(response).await,
            Handler::Page => self.on_page(response).await,
        }
    }

    fn on_self_info(&mut self, response: Response) -> Result<()> {
        let Response::SelfInfo { user_id } = response else {
            return Err(Error::Protocol("get_self"));
        };
        self.self_id = user_id;
        tracing::info!(user_id, "resolved own identity");
        Ok(())
    }

    /// Listing completion: dedup + sort the ids, recreate the output
    /// directory, seed the work stack, and start paginating the top entry.
    async fn on_conversation_list(&mut self, response: Response) -> Result<()> {
        let mut ids = match response {
            Response::Conversations { ids } => ids,
            Response::Error { code, message } => {
                tracing::error!(code, %message, "conversation listing failed");
                return Err(Error::Protocol("list_conversations"));
            }
            _ => return Err(Error::Protocol("list_conversations")),
        };

        ids.sort_unstable();
        ids.dedup();
        tracing::info!(total = ids.len(), "conversation listing complete");

        match fs::remove_dir_all(&self.config.output_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.config.output_dir)?;

        if ids.is_empty() {
            tracing::info!("no conversations to harvest");
            self.running = false;
            return Ok(());
        }

        // ascending sort + stack processing means the largest id runs first
        self.stack = ids
            .into_iter()
            .map(|id| ConversationTask {
                id,
                cursor: 0,
                harvested: 0,
            })
            .collect();

        self.open_writer_for_top()?;
        self.request_next_page().await
    }

    /// Page completion. An error or an empty page exhausts the active
    /// conversation; anything else advances the cursor and feeds the writer.
    /// Either way exactly one follow-up request goes out unless the stack
    /// just drained.
    async fn on_page(&mut self, response: Response) -> Result<()> {
        match response {
            Response::Messages { messages } if !messages.is_empty() => {
                if let Some(task) = self.stack.last_mut() {
                    task.harvested += messages.len() as i64;
                    // pages run newest-to-oldest: the last element is the
                    // oldest and becomes the cursor for the next page
                    if let Some(oldest) = messages.last() {
                        task.cursor = oldest.id;
                    }
                    tracing::debug!(
                        conversation = task.id,
                        received = task.harvested,
                        "page received"
                    );
                }
                if let Some(writer) = self.writer.as_mut() {
                    for message in messages {
                        writer.put(message)?;
                    }
                }
                self.request_next_page().await
            }
            Response::Messages { .. } => self.finish_conversation().await,
            Response::Error { code, message } => {
                tracing::warn!(code, %message, "history request failed, conversation ends here");
                self.finish_conversation().await
            }
            _ => {
                tracing::warn!("unexpected response to a history request, conversation ends here");
                self.finish_conversation().await
            }
        }
    }

    /// Close out the active conversation and either advance to the next one
    /// or finish the run.
    async fn finish_conversation(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        if let Some(task) = self.stack.pop() {
            tracing::info!(
                conversation = task.id,
                messages = task.harvested,
                "conversation harvested"
            );
            self.conversations_done += 1;
            self.messages_total += task.harvested;
        }

        if self.stack.is_empty() {
            tracing::info!("all conversations harvested");
            self.running = false;
            return Ok(());
        }

        self.open_writer_for_top()?;
        self.request_next_page().await
    }

    /// Open the writer for the top-of-stack conversation. The previous
    /// writer is always finished first, so a single output handle is open
    /// at any time; construction truncates whatever an earlier run left.
    fn open_writer_for_top(&mut self) -> Result<()> {
        let Some(task) = self.stack.last() else {
            return Ok(());
        };
        self.writer = Some(ChatWriter::create(&self.config, task.id, self.self_id)?);
        Ok(())
    }

    async fn request_next_page(&mut self) -> Result<()> {
        let Some(task) = self.stack.last() else {
            return Ok(());
        };
        let request = Request::GetHistory {
            conversation_id: task.id,
            from_message_id: task.cursor,
            limit: self.config.messages_per_request,
        };
        self.pending
            .register(self.transport.as_mut(), request, Handler::Page)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reap_client::{Inbound, Message};
    use std::collections::{HashMap, VecDeque};
    use std::io;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// One scripted answer to a history request
    enum Page {
        Messages(Vec<Message>),
        Fail(i32, String),
    }

    /// A deterministic in-memory stand-in for the bridge: every send
    /// synchronously enqueues the scripted inbound event it would produce,
    /// so the dispatch loop always terminates.
    struct ScriptedTransport {
        inbox: VecDeque<Inbound>,
        auth_script: VecDeque<Update>,
        user_id: i64,
        conversation_ids: Vec<i64>,
        pages: HashMap<i64, VecDeque<Page>>,
        sent: Arc<Mutex<Vec<(u64, Request)>>>,
    }

    impl ScriptedTransport {
        fn new(
            auth_script: Vec<Update>,
            user_id: i64,
            conversation_ids: Vec<i64>,
            pages: HashMap<i64, VecDeque<Page>>,
        ) -> (Self, Arc<Mutex<Vec<(u64, Request)>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            let mut auth_script: VecDeque<Update> = auth_script.into();
            let mut inbox = VecDeque::new();
            // the client volunteers its first auth state unprompted
            if let Some(first) = auth_script.pop_front() {
                inbox.push_back(Inbound::Update { update: first });
            }
            (
                Self {
                    inbox,
                    auth_script,
                    user_id,
                    conversation_ids,
                    pages,
                    sent: sent.clone(),
                },
                sent,
            )
        }

        fn advance_auth(&mut self) {
            if let Some(update) = self.auth_script.pop_front() {
                self.inbox.push_back(Inbound::Update { update });
            }
        }

        fn respond(&mut self, request_id: u64, response: Response) {
            self.inbox.push_back(Inbound::Response {
                request_id,
                response,
            });
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&mut self, request_id: u64, request: Request) -> reap_client::Result<()> {
            self.sent.lock().push((request_id, request.clone()));
            match request {
                Request::SetVerbosity { .. } | Request::Probe => {}
                Request::SetClientParams { .. }
                | Request::SubmitPhone { .. }
                | Request::SubmitCode { .. }
                | Request::SubmitPassword { .. } => self.advance_auth(),
                Request::GetSelf => {
                    let user_id = self.user_id;
                    self.respond(request_id, Response::SelfInfo { user_id });
                }
                Request::ListConversations { .. } => {
                    let ids = self.conversation_ids.clone();
                    self.respond(request_id, Response::Conversations { ids });
                }
                Request::GetHistory {
                    conversation_id, ..
                } => {
                    let page = self
                        .pages
                        .get_mut(&conversation_id)
                        .and_then(|queue| queue.pop_front());
                    let response = match page {
                        Some(Page::Messages(messages)) => Response::Messages { messages },
                        Some(Page::Fail(code, message)) => Response::Error { code, message },
                        None => Response::Messages { messages: vec![] },
                    };
                    self.respond(request_id, response);
                }
            }
            Ok(())
        }

        async fn poll(&mut self, _timeout: Duration) -> reap_client::Result<Option<Inbound>> {
            Ok(self.inbox.pop_front())
        }
    }

    /// Answers every prompt from canned strings and records what was asked.
    struct ScriptedPrompt {
        asked: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ScriptedPrompt {
        fn new() -> (Self, Arc<Mutex<Vec<&'static str>>>) {
            let asked = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    asked: asked.clone(),
                },
                asked,
            )
        }
    }

    impl CredentialPrompt for ScriptedPrompt {
        fn phone(&mut self) -> io::Result<String> {
            self.asked.lock().push("phone");
            Ok("+15550100".to_string())
        }

        fn code(&mut self) -> io::Result<String> {
            self.asked.lock().push("code");
            Ok("12345".to_string())
        }

        fn password(&mut self) -> io::Result<String> {
            self.asked.lock().push("password");
            Ok("hunter2".to_string())
        }
    }

    fn test_config(dir: &TempDir) -> HarvestConfig {
        HarvestConfig {
            output_dir: dir.path().join("out"),
            messages_per_request: 2,
            ..Default::default()
        }
    }

    fn read_output(config: &HarvestConfig, conversation_id: i64) -> String {
        std::fs::read_to_string(config.output_dir.join(conversation_id.to_string())).unwrap()
    }

    fn history_requests(
        sent: &Arc<Mutex<Vec<(u64, Request)>>>,
    ) -> Vec<(i64, i64)> {
        sent.lock()
            .iter()
            .filter_map(|(_, request)| match request {
                Request::GetHistory {
                    conversation_id,
                    from_message_id,
                    ..
                } => Some((*conversation_id, *from_message_id)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_harvest_with_interactive_authorization() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let mut pages = HashMap::new();
        pages.insert(
            42,
            VecDeque::from([
                Page::Messages(vec![Message::text(5, 1, "hi"), Message::text(4, 1, "yo")]),
                Page::Messages(vec![Message::text(3, 2, "sup")]),
            ]),
        );
        // listing carries duplicates and arrives unordered
        let (transport, sent) = ScriptedTransport::new(
            vec![
                Update::AuthWaitParams,
                Update::AuthWaitPhone,
                Update::AuthWaitCode,
                Update::AuthWaitPassword,
                Update::AuthReady,
            ],
            1,
            vec![42, 42],
            pages,
        );
        let (prompt, asked) = ScriptedPrompt::new();

        let mut harvester =
            Harvester::new(config.clone(), Box::new(transport), Box::new(prompt)).unwrap();
        let summary = harvester.run().await.unwrap();

        assert_eq!(
            summary,
            HarvestSummary {
                conversations: 1,
                messages: 3
            }
        );
        // every credential was asked for exactly once, in update order
        assert_eq!(*asked.lock(), vec!["phone", "code", "password"]);

        // buffer capacity exceeds the total, so the whole conversation comes
        // out chronological in a single batch
        assert_eq!(
            read_output(&config, 42),
            "<|cs|><|m|>sup<|--m|><|cs|><|m|><|--me--|>yo<|--m|><|m|><|--me--|>hi<|--m|>"
        );

        // cursor advance: first request from the newest, then from the LAST
        // message of each received page, and one final exhausting request
        assert_eq!(history_requests(&sent), vec![(42, 0), (42, 4), (42, 3)]);
    }

    #[tokio::test]
    async fn test_listing_is_deduplicated_sorted_and_processed_from_the_top() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let mut pages = HashMap::new();
        for id in [1, 3, 7] {
            pages.insert(
                id,
                VecDeque::from([Page::Messages(vec![Message::text(10, 2, "m")])]),
            );
        }
        let (transport, sent) = ScriptedTransport::new(
            vec![Update::AuthReady],
            1,
            vec![7, 3, 7, 1, 3],
            pages,
        );
        let (prompt, _) = ScriptedPrompt::new();

        let mut harvester =
            Harvester::new(config.clone(), Box::new(transport), Box::new(prompt)).unwrap();
        let summary = harvester.run().await.unwrap();

        assert_eq!(summary.conversations, 3);
        assert_eq!(summary.messages, 3);

        // largest id first, each conversation paginated to exhaustion before
        // the next one starts, never more than one history request in flight
        assert_eq!(
            history_requests(&sent),
            vec![(7, 0), (7, 10), (3, 0), (3, 10), (1, 0), (1, 10)]
        );
        for id in [1, 3, 7] {
            assert_eq!(read_output(&config, id), "<|cs|><|m|>m<|--m|>");
        }
    }

    #[tokio::test]
    async fn test_error_page_ends_only_that_conversation() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let mut pages = HashMap::new();
        pages.insert(9, VecDeque::from([Page::Fail(420, "FLOOD_WAIT".to_string())]));
        pages.insert(
            2,
            VecDeque::from([Page::Messages(vec![Message::text(1, 5, "ok")])]),
        );
        let (transport, _sent) =
            ScriptedTransport::new(vec![Update::AuthReady], 5, vec![9, 2], pages);
        let (prompt, _) = ScriptedPrompt::new();

        let mut harvester =
            Harvester::new(config.clone(), Box::new(transport), Box::new(prompt)).unwrap();
        let summary = harvester.run().await.unwrap();

        // the failing conversation still counts as processed, with an empty
        // (truncated) artifact; the run continues to the next one
        assert_eq!(summary.conversations, 2);
        assert_eq!(summary.messages, 1);
        assert_eq!(read_output(&config, 9), "");
        assert_eq!(read_output(&config, 2), "<|cs|><|m|><|--me--|>ok<|--m|>");
    }

    #[tokio::test]
    async fn test_empty_listing_completes_immediately() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let (transport, _sent) =
            ScriptedTransport::new(vec![Update::AuthReady], 1, vec![], HashMap::new());
        let (prompt, _) = ScriptedPrompt::new();

        let mut harvester =
            Harvester::new(config.clone(), Box::new(transport), Box::new(prompt)).unwrap();
        let summary = harvester.run().await.unwrap();

        assert_eq!(
            summary,
            HarvestSummary {
                conversations: 0,
                messages: 0
            }
        );
        // the output directory is still recreated
        assert!(config.output_dir.is_dir());
    }

    #[tokio::test]
    async fn test_rerun_truncates_prior_artifacts() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        std::fs::create_dir_all(&config.output_dir).unwrap();
        std::fs::write(config.output_dir.join("4"), "stale").unwrap();
        std::fs::write(config.output_dir.join("999"), "orphaned").unwrap();

        let mut pages = HashMap::new();
        pages.insert(
            4,
            VecDeque::from([Page::Messages(vec![Message::text(1, 1, "fresh")])]),
        );
        let (transport, _sent) =
            ScriptedTransport::new(vec![Update::AuthReady], 1, vec![4], pages);
        let (prompt, _) = ScriptedPrompt::new();

        let mut harvester =
            Harvester::new(config.clone(), Box::new(transport), Box::new(prompt)).unwrap();
        harvester.run().await.unwrap();

        assert_eq!(
            read_output(&config, 4),
            "<|cs|><|m|><|--me--|>fresh<|--m|>"
        );
        // the whole directory was recreated, so orphans are gone too
        assert!(!config.output_dir.join("999").exists());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_any_send() {
        let dir = TempDir::new().unwrap();
        let config = HarvestConfig {
            output_dir: dir.path().join("out"),
            messages_per_request: 0,
            ..Default::default()
        };

        let (transport, sent) =
            ScriptedTransport::new(vec![Update::AuthReady], 1, vec![], HashMap::new());
        let (prompt, _) = ScriptedPrompt::new();

        let result = Harvester::new(config.clone(), Box::new(transport), Box::new(prompt));
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(sent.lock().is_empty());
        // nothing touched the filesystem either
        assert!(!config.output_dir.exists());
    }

    #[tokio::test]
    async fn test_session_close_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let (transport, _sent) =
            ScriptedTransport::new(vec![Update::AuthClosed], 1, vec![], HashMap::new());
        let (prompt, _) = ScriptedPrompt::new();

        let mut harvester =
            Harvester::new(config, Box::new(transport), Box::new(prompt)).unwrap();
        assert!(matches!(harvester.run().await, Err(Error::Closed)));
    }
}
