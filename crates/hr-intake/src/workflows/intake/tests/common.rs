use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::workflows::intake::catalog::{
    build_catalog, CatalogError, CatalogHandle, CatalogLoader, CatalogSource, OpeningRow,
};
use crate::workflows::intake::domain::{ChatId, UserIdentity};
use crate::workflows::intake::driver::{
    BotCommand, ConversationDriver, DriverSettings, EventKind, IncomingEvent,
};
use crate::workflows::intake::gateway::{
    ChatError, ChatGateway, OutgoingMessage, ResponseSheet, SheetError,
};

pub(super) const CHAT: ChatId = ChatId(1001);
pub(super) const USER_ID: i64 = 555;
pub(super) const ADMIN_ID: i64 = 1;
pub(super) const REVIEWERS: ChatId = ChatId(-100);
pub(super) const DOC_LINK: &str = "https://docs.google.com/document/d/ABC123/edit";

pub(super) type TestDriver = ConversationDriver<MemorySource, MemorySheet, RecordingGateway>;

pub(super) fn row(code: &str, title: &str, order: &str, key: &str, question: &str) -> OpeningRow {
    OpeningRow {
        code: code.to_string(),
        title: title.to_string(),
        order: order.to_string(),
        key: key.to_string(),
        question: question.to_string(),
    }
}

pub(super) fn engineer_rows() -> Vec<OpeningRow> {
    vec![
        row("eng", "Engineer", "2", "city", "Which city are you in?"),
        row("eng", "Engineer", "1", "experience_years", "Years of experience?"),
        row("ops", "Operator", "1", "full_name", "Your name?"),
        row("ops", "Operator", "2", "phone", "Your phone?"),
        row("ops", "Operator", "3", "email", "Your email?"),
    ]
}

/// Catalog source whose rows can be swapped between reloads.
pub(super) struct MemorySource {
    rows: Mutex<Result<Vec<OpeningRow>, String>>,
}

impl MemorySource {
    pub(super) fn new(rows: Vec<OpeningRow>) -> Self {
        Self {
            rows: Mutex::new(Ok(rows)),
        }
    }

    pub(super) fn set_rows(&self, rows: Vec<OpeningRow>) {
        *self.rows.lock().expect("source mutex") = Ok(rows);
    }

    pub(super) fn fail_with(&self, reason: &str) {
        *self.rows.lock().expect("source mutex") = Err(reason.to_string());
    }
}

#[async_trait]
impl CatalogSource for MemorySource {
    async fn fetch_rows(&self) -> Result<Vec<OpeningRow>, CatalogError> {
        self.rows
            .lock()
            .expect("source mutex")
            .clone()
            .map_err(CatalogError::Source)
    }
}

#[derive(Default)]
pub(super) struct MemorySheet {
    pub(super) header: Mutex<Vec<String>>,
    pub(super) rows: Mutex<Vec<Vec<String>>>,
    pub(super) append_failure: Mutex<Option<String>>,
}

impl MemorySheet {
    pub(super) fn with_header(columns: &[&str]) -> Self {
        let sheet = Self::default();
        *sheet.header.lock().expect("header mutex") =
            columns.iter().map(|c| c.to_string()).collect();
        sheet
    }

    pub(super) fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().expect("rows mutex").clone()
    }

    pub(super) fn fail_appends(&self, reason: &str) {
        *self.append_failure.lock().expect("failure mutex") = Some(reason.to_string());
    }
}

#[async_trait]
impl ResponseSheet for MemorySheet {
    async fn header_row(&self) -> Result<Vec<String>, SheetError> {
        let header = self.header.lock().expect("header mutex").clone();
        if !header.is_empty() {
            return Ok(header);
        }
        // without a preset header the first written row is the header
        Ok(self
            .rows
            .lock()
            .expect("rows mutex")
            .first()
            .cloned()
            .unwrap_or_default())
    }

    async fn append_row(&self, cells: Vec<String>) -> Result<(), SheetError> {
        if let Some(reason) = self.append_failure.lock().expect("failure mutex").clone() {
            return Err(SheetError::Backend(reason));
        }
        self.rows.lock().expect("rows mutex").push(cells);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Sent {
    Message { chat: ChatId, text: String },
    Callback { text: Option<String>, alert: bool },
    Edit { chat: ChatId, text: String },
}

#[derive(Default)]
pub(super) struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingGateway {
    pub(super) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("gateway mutex").clone()
    }

    pub(super) fn messages_to(&self, chat: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Message { chat: to, text } if to == chat => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_message(
        &self,
        chat: ChatId,
        message: &OutgoingMessage,
    ) -> Result<(), ChatError> {
        self.sent.lock().expect("gateway mutex").push(Sent::Message {
            chat,
            text: message.text.clone(),
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        _callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), ChatError> {
        self.sent.lock().expect("gateway mutex").push(Sent::Callback {
            text: text.map(str::to_string),
            alert: show_alert,
        });
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat: ChatId,
        _message_id: i64,
        text: &str,
    ) -> Result<(), ChatError> {
        self.sent.lock().expect("gateway mutex").push(Sent::Edit {
            chat,
            text: text.to_string(),
        });
        Ok(())
    }
}

pub(super) struct Harness {
    pub(super) driver: TestDriver,
    pub(super) source: Arc<MemorySource>,
    pub(super) sheet: Arc<MemorySheet>,
    pub(super) gateway: Arc<RecordingGateway>,
}

pub(super) fn harness_with(rows: Vec<OpeningRow>, sheet: MemorySheet) -> Harness {
    let catalog = build_catalog(rows.clone()).expect("fixture catalog is valid");
    let source = Arc::new(MemorySource::new(rows));
    let sheet = Arc::new(sheet);
    let gateway = Arc::new(RecordingGateway::default());
    let driver = ConversationDriver::new(
        Arc::new(CatalogHandle::new(catalog)),
        CatalogLoader::new(source.clone()),
        sheet.clone(),
        gateway.clone(),
        DriverSettings {
            admin_ids: BTreeSet::from([ADMIN_ID]),
            reviewer_chat: Some(REVIEWERS),
            responses_tab: "Responses".to_string(),
        },
    );
    Harness {
        driver,
        source,
        sheet,
        gateway,
    }
}

pub(super) fn harness() -> Harness {
    harness_with(
        engineer_rows(),
        MemorySheet::with_header(&[
            "timestamp",
            "vacancy",
            "tg_id",
            "tg_username",
            "experience_years",
            "city",
            "resume_link_or_text",
        ]),
    )
}

pub(super) fn event_from(user_id: i64, kind: EventKind) -> IncomingEvent {
    IncomingEvent {
        chat: CHAT,
        user: UserIdentity {
            user_id,
            username: Some("candidate".to_string()),
        },
        kind,
    }
}

pub(super) fn event(kind: EventKind) -> IncomingEvent {
    event_from(USER_ID, kind)
}

pub(super) fn command(command: BotCommand) -> IncomingEvent {
    event(EventKind::Command(command))
}

pub(super) fn text(value: &str) -> IncomingEvent {
    event(EventKind::Text(value.to_string()))
}

pub(super) fn select(code: &str) -> IncomingEvent {
    event(EventKind::Selection {
        callback_id: "cb-1".to_string(),
        data: format!("vac:{code}"),
        message_id: Some(77),
    })
}

pub(super) fn document() -> IncomingEvent {
    event(EventKind::Document {
        file_name: Some("resume.pdf".to_string()),
    })
}
