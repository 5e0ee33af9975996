//! Event and reply text handling.
//!
//! Events may be stored without text; their display text is then built at
//! read time by a [`TextRenderer`]. Hosts that want different wording inject
//! their own renderer into the store.

use validator::Validate;

use crate::error::CoreError;
use crate::event::Action;

/// Trim optional event text, turning blank text into `None`.
pub fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Validate)]
struct ReplyBody {
    #[validate(length(min = 1, max = 500, message = "Reply text must be 1-500 characters"))]
    text: String,
}

/// Trim and validate reply text.
pub fn clean_reply_text(text: &str) -> Result<String, CoreError> {
    let body = ReplyBody {
        text: text.trim().to_string(),
    };
    body.validate()?;
    Ok(body.text)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Everything a renderer needs to describe an event without touching storage.
#[derive(Debug, Clone, Copy)]
pub struct TextContext<'a> {
    pub action: Action,
    /// Label of the creating user (username or similar).
    pub actor: &'a str,
    /// Verbose type name of the subject, e.g. `"blog post"`.
    pub about_type: Option<&'a str>,
    /// Label of the subject row, e.g. its title.
    pub about: Option<&'a str>,
}

/// Extension point for building display text of events stored without text.
pub trait TextRenderer: Send + Sync {
    fn render(&self, ctx: &TextContext<'_>) -> String;
}

/// `"{actor} {action} the {type} {label}"`, or `"on the"` for comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTextRenderer;

impl TextRenderer for DefaultTextRenderer {
    fn render(&self, ctx: &TextContext<'_>) -> String {
        let action = ctx.action.display().to_lowercase();
        let Some(about_type) = ctx.about_type else {
            return format!("{} {action}", ctx.actor);
        };
        let preposition = if ctx.action == Action::Commented {
            "on the"
        } else {
            "the"
        };
        match ctx.about {
            Some(label) => format!("{} {action} {preposition} {about_type} {label}", ctx.actor),
            None => format!("{} {action} {preposition} {about_type}", ctx.actor),
        }
    }
}
