//! Job-application intake: opening catalog, conversation driver, submission storage and
//! reviewer notifications.

pub mod catalog;
pub mod domain;
pub mod driver;
pub mod gateway;
pub mod messages;
pub mod notifier;
pub mod persister;
pub mod session;
pub mod validation;

#[cfg(test)]
mod tests;

pub use catalog::{
    build_catalog, CatalogError, CatalogHandle, CatalogLoader, CatalogSource, CsvCatalogSource,
    OpeningRow,
};
pub use domain::{
    AnswerValue, CatalogSummary, ChatId, JobOpening, OpeningCatalog, OpeningId, Question,
    SessionPhase, SessionState, SubmissionRecord, UserIdentity,
};
pub use driver::{
    deliver, BotCommand, ConversationDriver, DriverSettings, EventKind, IncomingEvent, Reply,
};
pub use gateway::{
    ChatError, ChatGateway, InlineButton, InlineKeyboard, OutgoingMessage, ResponseSheet,
    SheetError,
};
pub use notifier::ReviewNotifier;
pub use persister::{ColumnLayout, PersistenceError, SubmissionPersister};
pub use validation::{accepted_document_id, is_accepted_link};
