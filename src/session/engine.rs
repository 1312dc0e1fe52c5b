//! Dialog state machine
//!
//! Drives topic → count → results → action for every conversation. No
//! collaborator failure escapes [`SessionEngine::handle`]: retrieval and
//! catalog errors read as "nothing found", delivery errors are counted per
//! item, and every turn ends in a valid phase.

use super::selection::sample;
use super::{Command, ConversationId, DialogPhase, Input, Notice, SessionState, SessionStore};
use crate::catalog::{CatalogStore, Item};
use crate::config::Config;
use crate::delivery::{DeliveryAdapter, ItemMessage};
use crate::retrieval::HybridRetriever;
use std::num::IntErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Numeric bounds of the dialog
#[derive(Debug, Clone)]
pub struct DialogSettings {
    /// Largest count delivered in one turn
    pub max_count: usize,
    /// Candidates requested from the retriever for a new topic
    pub overfetch_limit: usize,
    /// Character limit for captions and descriptions
    pub text_limit: usize,
    /// Idle time after which a session is dropped
    pub session_idle: Duration,
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            max_count: 20,
            overfetch_limit: 100,
            text_limit: 1000,
            session_idle: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl From<&Config> for DialogSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_count: config.dialog.max_count,
            overfetch_limit: config.retrieval.overfetch_limit,
            text_limit: config.dialog.text_limit,
            session_idle: Duration::from_secs(config.dialog.session_idle_secs),
        }
    }
}

/// Outcome of parsing a requested count
enum CountRequest {
    Valid(usize),
    NotPositive,
    NotNumber,
}

fn parse_count(text: &str) -> CountRequest {
    match text.trim().parse::<i64>() {
        Ok(n) if n > 0 => CountRequest::Valid(usize::try_from(n).unwrap_or(usize::MAX)),
        Ok(_) => CountRequest::NotPositive,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => CountRequest::Valid(usize::MAX),
            IntErrorKind::NegOverflow => CountRequest::NotPositive,
            _ => CountRequest::NotNumber,
        },
    }
}

/// Map a requested item number onto catalog ids `1..=count`
pub fn wrap_item_number(number: u64, count: u64) -> Option<u64> {
    if count == 0 {
        return None;
    }
    if (1..=count).contains(&number) {
        return Some(number);
    }
    match number % count {
        0 => Some(count),
        rest => Some(rest),
    }
}

pub struct SessionEngine {
    store: SessionStore,
    retriever: Arc<HybridRetriever>,
    catalog: Arc<dyn CatalogStore>,
    delivery: Arc<dyn DeliveryAdapter>,
    settings: DialogSettings,
}

impl SessionEngine {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        catalog: Arc<dyn CatalogStore>,
        delivery: Arc<dyn DeliveryAdapter>,
        settings: DialogSettings,
    ) -> Self {
        Self {
            store: SessionStore::new(),
            retriever,
            catalog,
            delivery,
            settings,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Drop sessions idle longer than the configured timeout
    pub async fn evict_idle(&self) -> usize {
        let evicted = self.store.evict_idle(self.settings.session_idle).await;
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        evicted
    }

    /// Process one turn of `conversation` and return the phase it ends in
    pub async fn handle(&self, conversation: ConversationId, input: Input) -> DialogPhase {
        let mut state = self.store.acquire(conversation).await;
        debug!(
            "Conversation {} in {:?} received {:?}",
            conversation, state.phase, input
        );

        match input {
            Input::Command(Command::Start) => {
                self.store.discard(conversation, &mut state).await;
                self.notify(conversation, Notice::Welcome).await;
                DialogPhase::AwaitingTopic
            }
            Input::Command(Command::End) if state.phase == DialogPhase::AwaitingAction => {
                self.store.discard(conversation, &mut state).await;
                info!("Conversation {} ended its search", conversation);
                self.notify(conversation, Notice::SearchCompleted).await;
                DialogPhase::AwaitingTopic
            }
            input => {
                self.step(conversation, &mut state, input).await;
                state.phase
            }
        }
    }

    async fn step(&self, to: ConversationId, state: &mut SessionState, input: Input) {
        match input {
            Input::Command(Command::Help) => {
                self.notify(to, Notice::Help).await;
                if state.has_results() {
                    state.phase = DialogPhase::AwaitingAction;
                    self.notify(to, Notice::ChooseAction).await;
                }
            }
            Input::Command(Command::Search) => self.prompt_topic(to, state).await,
            Input::Command(Command::RandomItem) => {
                state.phase = DialogPhase::AwaitingItemNumber;
                self.notify(to, Notice::EnterItemNumber).await;
            }
            Input::Command(command) if command.is_action() => {
                if state.phase == DialogPhase::AwaitingAction {
                    self.action(to, state, command).await;
                } else {
                    self.reprompt(to, state).await;
                }
            }
            Input::Command(_) => self.reprompt(to, state).await,
            Input::Text(text) => match state.phase {
                DialogPhase::AwaitingTopic => self.topic(to, state, &text).await,
                DialogPhase::AwaitingCount => self.count(to, state, &text).await,
                DialogPhase::AwaitingAction => self.notify(to, Notice::UseControls).await,
                DialogPhase::AwaitingItemNumber => self.item_number(to, state, &text).await,
            },
        }
    }

    async fn action(&self, to: ConversationId, state: &mut SessionState, command: Command) {
        match command {
            Command::More => {
                // Nothing searched yet (e.g. after a random item): ask for a topic
                if !state.has_results() {
                    self.prompt_topic(to, state).await;
                    return;
                }
                if state.is_exhausted() {
                    self.notify(to, Notice::AllViewed).await;
                    self.notify(to, Notice::ChooseAction).await;
                    return;
                }
                let notice = Notice::MorePrompt {
                    topic: state.topic.clone().unwrap_or_default(),
                    remaining: state.remaining(),
                };
                state.phase = DialogPhase::AwaitingCount;
                self.notify(to, notice).await;
            }
            Command::NewTopic => self.prompt_topic(to, state).await,
            // End is handled in `handle` because it discards the session
            _ => self.reprompt(to, state).await,
        }
    }

    /// Ask again for whatever the current phase expects
    async fn reprompt(&self, to: ConversationId, state: &SessionState) {
        let notice = match state.phase {
            DialogPhase::AwaitingTopic => Notice::EnterTopic,
            DialogPhase::AwaitingCount => Notice::EnterCount {
                topic: state.topic.clone().unwrap_or_default(),
            },
            DialogPhase::AwaitingAction => Notice::UseControls,
            DialogPhase::AwaitingItemNumber => Notice::EnterItemNumber,
        };
        self.notify(to, notice).await;
    }

    async fn prompt_topic(&self, to: ConversationId, state: &mut SessionState) {
        state.clear_topic();
        state.phase = DialogPhase::AwaitingTopic;
        self.notify(to, Notice::EnterTopic).await;
    }

    async fn topic(&self, to: ConversationId, state: &mut SessionState, text: &str) {
        let topic = text.trim();
        if topic.is_empty() {
            self.notify(to, Notice::EmptyTopic).await;
            return;
        }

        state.set_topic(topic);
        self.notify(
            to,
            Notice::EnterCount {
                topic: topic.to_string(),
            },
        )
        .await;
    }

    async fn count(&self, to: ConversationId, state: &mut SessionState, text: &str) {
        let requested = match parse_count(text) {
            CountRequest::Valid(n) => n,
            CountRequest::NotPositive => {
                self.notify(to, Notice::CountNotPositive).await;
                return;
            }
            CountRequest::NotNumber => {
                self.notify(to, Notice::CountNotNumber).await;
                return;
            }
        };

        let max = self.settings.max_count;
        let n = if requested > max {
            self.notify(to, Notice::CountClamped { max }).await;
            max
        } else {
            requested
        };
        state.last_requested_count = n;

        self.deliver_batch(to, state, n).await;
    }

    /// Select up to `n` unseen items of the current topic and deliver them
    async fn deliver_batch(&self, to: ConversationId, state: &mut SessionState, n: usize) {
        let resolved = self.resolve_topic(state).await;

        let available: Vec<Item> = resolved
            .into_iter()
            .filter(|item| !state.shown_ids.contains(&item.id))
            .collect();

        if available.is_empty() {
            if state.shown_ids.is_empty() {
                self.nothing_found(to, state).await;
            } else {
                state.phase = DialogPhase::AwaitingAction;
                self.notify(to, Notice::AllViewed).await;
                self.notify(to, Notice::ChooseAction).await;
            }
            return;
        }

        let selected = sample(available, n);
        // Recorded before sending so a failed item is not retried on this topic
        state.shown_ids.extend(selected.iter().map(|item| item.id));

        let mut sent = 0;
        for item in &selected {
            let message = ItemMessage::from_item(item, self.settings.text_limit);
            match self.delivery.send_item(to, &message).await {
                Ok(()) => sent += 1,
                Err(e) => error!("Failed to deliver item {} to {}: {}", item.id, to, e),
            }
        }

        debug!(
            "Conversation {}: delivered {}/{} (requested {}, shown {}/{})",
            to,
            sent,
            selected.len(),
            n,
            state.shown_ids.len(),
            state.total_available
        );

        if sent == 0 {
            self.nothing_found(to, state).await;
            return;
        }

        let summary = if sent < n {
            Notice::PartiallyFound {
                sent,
                total: state.total_available,
            }
        } else {
            Notice::Found { sent }
        };
        state.phase = DialogPhase::AwaitingAction;
        self.notify(to, summary).await;
        self.notify(to, Notice::ChooseAction).await;
    }

    /// Catalog records of the current topic, searching only on first use
    async fn resolve_topic(&self, state: &mut SessionState) -> Vec<Item> {
        if let Some(ids) = &state.topic_ids {
            return self.fetch_or_empty(ids).await;
        }

        let Some(topic) = state.topic.clone() else {
            return Vec::new();
        };

        let candidates = self
            .retriever
            .retrieve(&topic, self.settings.overfetch_limit)
            .await;
        let ids: Vec<i64> = candidates.iter().map(|c| c.id).collect();
        let resolved = self.fetch_or_empty(&ids).await;

        info!(
            "Topic {:?}: {} candidates, {} resolved",
            topic,
            ids.len(),
            resolved.len()
        );

        if !resolved.is_empty() {
            state.topic_ids = Some(resolved.iter().map(|item| item.id).collect());
        }
        state.total_available = resolved.len();
        resolved
    }

    async fn fetch_or_empty(&self, ids: &[i64]) -> Vec<Item> {
        match self.catalog.fetch(ids).await {
            Ok(items) => items,
            Err(e) => {
                warn!("Catalog lookup of {} ids failed: {}", ids.len(), e);
                Vec::new()
            }
        }
    }

    async fn nothing_found(&self, to: ConversationId, state: &mut SessionState) {
        state.clear_topic();
        state.phase = DialogPhase::AwaitingTopic;
        self.notify(to, Notice::NothingFound).await;
    }

    async fn item_number(&self, to: ConversationId, state: &mut SessionState, text: &str) {
        let Ok(number) = text.trim().parse::<u64>() else {
            self.notify(to, Notice::ItemNumberNotNumber).await;
            return;
        };

        let item = match self.catalog.count().await {
            Ok(count) => match wrap_item_number(number, count) {
                Some(id) => self.lookup(id).await,
                None => None,
            },
            Err(e) => {
                warn!("Catalog count failed: {}", e);
                None
            }
        };

        match item {
            Some(item) => {
                let message = ItemMessage::from_item(&item, self.settings.text_limit);
                if let Err(e) = self.delivery.send_item(to, &message).await {
                    error!("Failed to deliver item {} to {}: {}", item.id, to, e);
                }
            }
            None => self.notify(to, Notice::ItemNotFound).await,
        }

        state.phase = DialogPhase::AwaitingAction;
        self.notify(to, Notice::ChooseAction).await;
    }

    async fn lookup(&self, id: u64) -> Option<Item> {
        let id = i64::try_from(id).ok()?;
        match self.catalog.get(id).await {
            Ok(item) => item,
            Err(e) => {
                warn!("Catalog lookup of item {} failed: {}", id, e);
                None
            }
        }
    }

    async fn notify(&self, to: ConversationId, notice: Notice) {
        if let Err(e) = self.delivery.send_notice(to, &notice).await {
            warn!("Failed to send notice to {}: {}", to, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_item_number() {
        assert_eq!(wrap_item_number(1, 1122), Some(1));
        assert_eq!(wrap_item_number(1122, 1122), Some(1122));
        assert_eq!(wrap_item_number(1123, 1122), Some(1));
        assert_eq!(wrap_item_number(2244, 1122), Some(1122));
        assert_eq!(wrap_item_number(0, 1122), Some(1122));
        assert_eq!(wrap_item_number(5, 0), None);
    }

    #[test]
    fn test_parse_count() {
        assert!(matches!(parse_count("5"), CountRequest::Valid(5)));
        assert!(matches!(parse_count(" 20 "), CountRequest::Valid(20)));
        assert!(matches!(parse_count("-3"), CountRequest::NotPositive));
        assert!(matches!(parse_count("0"), CountRequest::NotPositive));
        assert!(matches!(parse_count("five"), CountRequest::NotNumber));
        assert!(matches!(parse_count("2.5"), CountRequest::NotNumber));
        assert!(matches!(
            parse_count("99999999999999999999999"),
            CountRequest::Valid(usize::MAX)
        ));
        assert!(matches!(
            parse_count("-99999999999999999999999"),
            CountRequest::NotPositive
        ));
    }
}
