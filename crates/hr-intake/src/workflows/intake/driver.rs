use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::catalog::{CatalogHandle, CatalogLoader, CatalogSource};
use super::domain::{ChatId, OpeningId, SessionPhase, SessionState, SubmissionRecord, UserIdentity};
use super::gateway::{ChatGateway, OutgoingMessage, ResponseSheet};
use super::messages;
use super::notifier::ReviewNotifier;
use super::persister::SubmissionPersister;
use super::session::{SessionGuard, SessionStore};
use super::validation::is_accepted_link;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    MyId,
    Reload,
}

impl BotCommand {
    /// Accepts `/start`, `/start@SomeBot` and trailing arguments.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "myid" => Some(Self::MyId),
            "reload" => Some(Self::Reload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Command(BotCommand),
    Text(String),
    Document { file_name: Option<String> },
    /// Inline button press. `message_id` is the message carrying the keyboard.
    Selection {
        callback_id: String,
        data: String,
        message_id: Option<i64>,
    },
    /// Photos, stickers and anything else without text.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEvent {
    pub chat: ChatId,
    pub user: UserIdentity,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Message(OutgoingMessage),
    CallbackNotice {
        callback_id: String,
        text: Option<String>,
        show_alert: bool,
    },
    EditOrigin {
        message_id: i64,
        text: String,
    },
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self::Message(OutgoingMessage::text(text))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DriverSettings {
    pub admin_ids: BTreeSet<i64>,
    pub reviewer_chat: Option<ChatId>,
    pub responses_tab: String,
}

/// Runs the intake conversation: opening menu, question round, resume link, submission.
pub struct ConversationDriver<C, S, G> {
    catalog: Arc<CatalogHandle>,
    loader: CatalogLoader<C>,
    persister: SubmissionPersister<S>,
    notifier: ReviewNotifier<G>,
    gateway: Arc<G>,
    sessions: Arc<SessionStore>,
    settings: DriverSettings,
}

impl<C, S, G> ConversationDriver<C, S, G>
where
    C: CatalogSource + 'static,
    S: ResponseSheet + 'static,
    G: ChatGateway + 'static,
{
    pub fn new(
        catalog: Arc<CatalogHandle>,
        loader: CatalogLoader<C>,
        sheet: Arc<S>,
        gateway: Arc<G>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            catalog,
            loader,
            persister: SubmissionPersister::new(sheet),
            notifier: ReviewNotifier::new(gateway.clone(), settings.reviewer_chat),
            gateway,
            sessions: Arc::new(SessionStore::new()),
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<CatalogHandle> {
        &self.catalog
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handles one event and delivers the replies while the chat is still locked, so
    /// replies to consecutive messages of a chat never interleave.
    pub async fn process(&self, event: IncomingEvent) {
        let mut session = self.sessions.lock(event.chat).await;
        let replies = self.dispatch(&mut session, &event).await;
        deliver(self.gateway.as_ref(), event.chat, replies).await;
    }

    /// Applies one event to its chat's session and returns the replies to send.
    pub async fn handle(&self, event: &IncomingEvent) -> Vec<Reply> {
        let mut session = self.sessions.lock(event.chat).await;
        self.dispatch(&mut session, event).await
    }

    async fn dispatch(&self, session: &mut SessionGuard, event: &IncomingEvent) -> Vec<Reply> {
        let phase = session.state().map(|state| state.phase);
        debug!(
            chat = %event.chat,
            phase = phase.map(SessionPhase::label).unwrap_or("idle"),
            "handling intake event"
        );

        match &event.kind {
            EventKind::Command(BotCommand::Start) => self.start(session),
            EventKind::Command(BotCommand::MyId) => {
                vec![Reply::text(messages::caller_id(event.user.user_id))]
            }
            EventKind::Command(BotCommand::Reload) => self.reload(&event.user).await,
            EventKind::Selection {
                callback_id,
                data,
                message_id,
            } => self.select(session, callback_id, data, *message_id),
            EventKind::Text(text) => match phase {
                None => vec![Reply::text(messages::SEND_START)],
                Some(SessionPhase::ChoosingOpening) => vec![self.menu(messages::CHOOSE_FROM_MENU)],
                Some(SessionPhase::AskingQuestions) => self.answer(session, text),
                Some(SessionPhase::AwaitingResume) => {
                    self.submit(session, &event.user, text).await
                }
            },
            EventKind::Document { .. } | EventKind::Unsupported => match phase {
                None => vec![Reply::text(messages::SEND_START)],
                Some(SessionPhase::ChoosingOpening) => vec![self.menu(messages::CHOOSE_FROM_MENU)],
                Some(SessionPhase::AskingQuestions) => {
                    vec![Reply::text(messages::TEXT_ANSWER_ONLY)]
                }
                Some(SessionPhase::AwaitingResume) => {
                    vec![Reply::text(messages::NEED_GOOGLE_DOC)]
                }
            },
        }
    }

    fn menu(&self, text: &str) -> Reply {
        let catalog = self.catalog.snapshot();
        Reply::Message(OutgoingMessage::with_keyboard(
            text,
            messages::opening_menu(&catalog),
        ))
    }

    fn start(&self, session: &mut SessionGuard) -> Vec<Reply> {
        session.set(SessionState::choosing());
        vec![self.menu(messages::GREETING)]
    }

    fn select(
        &self,
        session: &mut SessionGuard,
        callback_id: &str,
        data: &str,
        message_id: Option<i64>,
    ) -> Vec<Reply> {
        let acknowledge = Reply::CallbackNotice {
            callback_id: callback_id.to_string(),
            text: None,
            show_alert: false,
        };

        let Some(code) = data.strip_prefix(messages::OPENING_CALLBACK_PREFIX) else {
            return vec![acknowledge];
        };

        let catalog = self.catalog.snapshot();
        let Some(opening) = catalog.get(&OpeningId::new(code)).cloned() else {
            debug!(code, "rejecting selection of unknown opening");
            return vec![Reply::CallbackNotice {
                callback_id: callback_id.to_string(),
                text: Some(messages::OPENING_NOT_FOUND.to_string()),
                show_alert: true,
            }];
        };

        let state = SessionState::for_opening(opening.clone());
        let next = match state.pending_question() {
            Some(question) => question.prompt.clone(),
            None => messages::RESUME_PROMPT.to_string(),
        };
        session.set(state);

        let chosen = messages::opening_chosen(&opening.title);
        let confirmation = match message_id {
            Some(message_id) => Reply::EditOrigin {
                message_id,
                text: chosen,
            },
            None => Reply::text(chosen),
        };
        vec![acknowledge, confirmation, Reply::text(next)]
    }

    fn answer(&self, session: &mut SessionGuard, text: &str) -> Vec<Reply> {
        let Some(state) = session.state_mut() else {
            return vec![Reply::text(messages::SEND_START)];
        };
        let next = state
            .record_answer(text)
            .map(|question| question.prompt.clone());
        match next {
            Some(prompt) => vec![Reply::text(prompt)],
            None => vec![Reply::text(messages::RESUME_PROMPT)],
        }
    }

    async fn submit(
        &self,
        session: &mut SessionGuard,
        user: &UserIdentity,
        text: &str,
    ) -> Vec<Reply> {
        if !is_accepted_link(text) {
            return vec![Reply::text(messages::NEED_GOOGLE_DOC)];
        }

        let record = match session.state() {
            Some(SessionState {
                opening: Some(opening),
                answers,
                ..
            }) => SubmissionRecord::assemble(opening, user, answers, text, Utc::now()),
            _ => {
                session.clear();
                return vec![Reply::text(messages::SEND_START)];
            }
        };

        let reply = match self.persister.append(&record).await {
            Ok(()) => {
                info!(
                    opening = %record.opening_id,
                    user_id = record.user_id,
                    "submission recorded"
                );
                self.notifier.notify(&record, None).await;
                messages::THANKS
            }
            Err(err) => {
                error!(
                    error = %err,
                    opening = %record.opening_id,
                    user_id = record.user_id,
                    "submission could not be stored; notifying reviewers only"
                );
                self.notifier.notify(&record, Some(&err.to_string())).await;
                messages::STORAGE_FAILED
            }
        };

        session.clear();
        vec![Reply::text(reply)]
    }

    async fn reload(&self, user: &UserIdentity) -> Vec<Reply> {
        if !self.settings.admin_ids.contains(&user.user_id) {
            warn!(user_id = user.user_id, "reload requested by non-admin");
            return vec![Reply::text(messages::ACCESS_DENIED)];
        }

        let mut replies = vec![Reply::text(messages::RELOADING)];
        match self.catalog.reload(&self.loader).await {
            Err(err) => replies.push(Reply::text(messages::reload_failed(&err.to_string()))),
            Ok(summary) => {
                let snapshot = self.catalog.snapshot();
                let report = match self.persister.diff_missing_columns(&snapshot).await {
                    Ok(missing) => {
                        if !missing.is_empty() {
                            warn!(?missing, "question keys without a Responses column");
                        }
                        messages::reload_succeeded(
                            summary,
                            &self.settings.responses_tab,
                            Ok(&missing),
                        )
                    }
                    Err(err) => messages::reload_succeeded(
                        summary,
                        &self.settings.responses_tab,
                        Err(err.to_string().as_str()),
                    ),
                };
                replies.push(Reply::text(report));
            }
        }
        replies
    }
}

/// Sends replies in order; a failed reply is logged and the rest are still attempted.
pub async fn deliver<G>(gateway: &G, chat: ChatId, replies: Vec<Reply>)
where
    G: ChatGateway + ?Sized,
{
    for reply in replies {
        let result = match &reply {
            Reply::Message(message) => gateway.send_message(chat, message).await,
            Reply::CallbackNotice {
                callback_id,
                text,
                show_alert,
            } => {
                gateway
                    .answer_callback(callback_id, text.as_deref(), *show_alert)
                    .await
            }
            Reply::EditOrigin { message_id, text } => {
                gateway.edit_message_text(chat, *message_id, text).await
            }
        };
        if let Err(err) = result {
            warn!(error = %err, %chat, "reply was not delivered");
        }
    }
}
