use std::sync::Arc;

use comrak::plugins::syntect::SyntectAdapter;
use comrak::{ComrakOptions, ComrakPlugins, markdown_to_html_with_plugins};
use dioxus::prelude::*;
use once_cell::sync::Lazy;
use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing::debug;

use crate::api::GatewayApi;
use crate::scroll::{ScrollCommand, Viewport};

pub const MESSAGE_LIST_ID: &str = "message-list";

/// Gateway client shared through the component tree.
#[derive(Clone)]
pub struct GatewayHandle(pub Arc<dyn GatewayApi>);

static MARKDOWN_OPTIONS: Lazy<ComrakOptions> = Lazy::new(|| {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.tasklist = true;
    options
});

pub fn markdown_to_html(md: &str) -> String {
    let adapter = SyntectAdapter::new(Some("base16-ocean.dark"));
    let mut plugins = ComrakPlugins::default();
    plugins.render.codefence_syntax_highlighter = Some(&adapter);
    markdown_to_html_with_plugins(md, &MARKDOWN_OPTIONS, &plugins)
}

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:zero]:[minute padding:zero] [period case:upper]");

pub fn format_message_timestamp(timestamp: OffsetDateTime) -> Option<String> {
    let mut datetime = timestamp;
    if let Ok(offset) = UtcOffset::current_local_offset() {
        datetime = datetime.to_offset(offset);
    }
    datetime.format(MESSAGE_TIME_FORMAT).ok()
}

pub fn copy_to_clipboard(text: String) {
    #[cfg(any(feature = "desktop", feature = "mobile"))]
    {
        if let Ok(mut cb) = arboard::Clipboard::new() {
            let _ = cb.set_text(text);
        }
    }
    #[cfg(not(any(feature = "desktop", feature = "mobile")))]
    {
        let payload = serde_json::to_string(&text).unwrap_or_default();
        let _ = document::eval(&format!("navigator.clipboard.writeText({payload});"));
    }
}

/// Read the message list geometry from the rendered document.
pub async fn measure_viewport() -> Option<Viewport> {
    let js = format!(
        r#"
        const el = document.getElementById("{MESSAGE_LIST_ID}");
        if (!el) {{ return null; }}
        return [el.scrollTop, el.scrollHeight, el.clientHeight];
        "#
    );
    let value = document::eval(&js).await.ok()?;
    let [top, height, client]: [f64; 3] = serde_json::from_value(value).ok()?;
    Some(Viewport::new(top, height, client))
}

pub fn apply_scroll(command: ScrollCommand) {
    let target = match command {
        ScrollCommand::ScrollTo { top } => format!("top: {top}, behavior: \"instant\""),
        ScrollCommand::ToBottom { smooth } => format!(
            "top: el.scrollHeight, behavior: \"{}\"",
            if smooth { "smooth" } else { "instant" }
        ),
    };
    debug!(?command, "Applying scroll command");
    let _ = document::eval(&format!(
        r#"
        const el = document.getElementById("{MESSAGE_LIST_ID}");
        if (el) {{ el.scrollTo({{ {target} }}); }}
        "#
    ));
}
