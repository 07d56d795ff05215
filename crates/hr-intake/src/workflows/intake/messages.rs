use std::collections::BTreeSet;

use super::domain::{CatalogSummary, OpeningCatalog};
use super::gateway::{InlineButton, InlineKeyboard};

pub const OPENING_CALLBACK_PREFIX: &str = "vac:";
pub const NOOP_CALLBACK: &str = "noop";

pub const GREETING: &str = "Hi! I'll help you apply for a job with us. You will need a link to \
your resume as a <b>Google Doc</b>, shared so that anyone with the link can open it.\n\
Choose the opening you are interested in:";

pub const RESUME_PROMPT: &str = "Please send a link to your resume as a <b>Google Doc</b>.\n\n\
How to do it:\n\
1) Upload your PDF or DOC/DOCX to Google Drive\n\
2) Right click → \"Open with\" → \"Google Docs\"\n\
3) File → Share → General access: \"Anyone with the link\", role \"Viewer\"\n\
4) Send me that link";

pub const NEED_GOOGLE_DOC: &str = "I need a link to a <b>Google Doc</b> specifically.\n\n\
How to do it:\n\
1) Upload your PDF/DOC/DOCX to Google Drive\n\
2) Right click → \"Open with\" → \"Google Docs\"\n\
3) File → Share → General access: \"Anyone with the link\", role \"Viewer\"\n\
4) Send the link here";

pub const OPENINGS_UNAVAILABLE: &str = "Openings are temporarily unavailable";
pub const OPENING_NOT_FOUND: &str = "Opening not found";
pub const CHOOSE_FROM_MENU: &str = "Please pick an opening from the menu:";
pub const SEND_START: &str = "Send /start to apply for an opening.";
pub const TEXT_ANSWER_ONLY: &str = "Please answer with a text message.";
pub const THANKS: &str =
    "Thank you! We have received your application. HR will contact you if it is a match ✅";
pub const STORAGE_FAILED: &str =
    "⚠️ Something went wrong while saving your application. HR has been notified anyway.";
pub const ACCESS_DENIED: &str =
    "⛔ Access denied. Ask an administrator to add your ID to ADMIN_IDS.";
pub const RELOADING: &str = "🔄 Reloading openings from the spreadsheet…";

/// Minimal escaping for Telegram's HTML parse mode.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn opening_menu(catalog: &OpeningCatalog) -> InlineKeyboard {
    if catalog.is_empty() {
        return InlineKeyboard::single_column([InlineButton {
            text: OPENINGS_UNAVAILABLE.to_string(),
            callback_data: NOOP_CALLBACK.to_string(),
        }]);
    }
    InlineKeyboard::single_column(catalog.iter().map(|opening| InlineButton {
        text: opening.title.clone(),
        callback_data: format!("{OPENING_CALLBACK_PREFIX}{}", opening.id),
    }))
}

pub fn opening_chosen(title: &str) -> String {
    format!(
        "You chose: <b>{}</b>\nPlease answer a few questions.",
        escape_html(title)
    )
}

pub fn caller_id(user_id: i64) -> String {
    format!("Your ID: <code>{user_id}</code>")
}

pub fn reload_failed(detail: &str) -> String {
    format!(
        "❌ Could not reload openings: <code>{}</code>",
        escape_html(detail)
    )
}

pub fn reload_succeeded(
    summary: CatalogSummary,
    responses_tab: &str,
    missing: Result<&BTreeSet<String>, &str>,
) -> String {
    let mut lines = vec![format!(
        "✅ Updated. Openings: <b>{}</b>, questions: <b>{}</b>.",
        summary.openings, summary.questions
    )];
    match missing {
        Ok(missing) if missing.is_empty() => lines.push(format!(
            "🟢 Every question key has a column in <b>{}</b>.",
            escape_html(responses_tab)
        )),
        Ok(missing) => {
            let keys = missing.iter().cloned().collect::<Vec<_>>().join(", ");
            lines.push(format!(
                "⚠️ <b>{}</b> has no columns for keys: <code>{}</code>.\n\
                 Add them to the <b>end</b> of the header row so answers are recorded.",
                escape_html(responses_tab),
                escape_html(&keys)
            ));
        }
        Err(detail) => lines.push(format!(
            "⚠️ Could not compare question keys with the <b>{}</b> header: <code>{}</code>",
            escape_html(responses_tab),
            escape_html(detail)
        )),
    }
    lines.join("\n")
}
