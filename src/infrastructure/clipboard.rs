use arboard::Clipboard;

/// Reads text from the system clipboard.
///
/// Returns `None` when no clipboard is reachable (headless sessions) or it
/// holds no text.
pub fn paste_text() -> Option<String> {
    let mut clipboard = match Clipboard::new() {
        Ok(clipboard) => clipboard,
        Err(e) => {
            tracing::debug!(error = %e, "clipboard unavailable");
            return None;
        }
    };
    match clipboard.get_text() {
        Ok(text) if !text.is_empty() => Some(text),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "clipboard has no text");
            None
        }
    }
}
