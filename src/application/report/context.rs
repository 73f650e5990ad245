//! Mutable state threaded through one report render.

use crate::application::report::markdown::{heading_line, title_anchor};
use crate::application::report::numberer::HeadingNumberer;

/// Numbering state plus the headings emitted while numbering was switched off.
///
/// The root title and its table-of-contents heading are rendered inside a
/// disabled window; the numbering pass leaves those exact lines untouched.
#[derive(Debug, Default)]
pub struct RenderContext {
    numberer: HeadingNumberer,
    unnumbered: Vec<String>,
    last_update: String,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            last_update: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ..Self::default()
        }
    }

    /// Fixes the "Last update" stamp, for reproducible output.
    pub fn with_last_update(mut self, stamp: impl Into<String>) -> Self {
        self.last_update = stamp.into();
        self
    }

    pub fn last_update(&self) -> &str {
        &self.last_update
    }

    /// Clears counters and recorded headings and enables numbering.
    pub fn reset(&mut self) {
        self.numberer.reset();
        self.numberer.enable();
        self.unnumbered.clear();
    }

    pub fn numberer(&mut self) -> &mut HeadingNumberer {
        &mut self.numberer
    }

    pub fn numbering_enabled(&self) -> bool {
        self.numberer.is_enabled()
    }

    pub fn disable_numbering(&mut self) {
        self.numberer.disable();
    }

    pub fn enable_numbering(&mut self) {
        self.numberer.enable();
    }

    /// Linked markdown heading, anchored at `anchor` or at the slug of `title`.
    pub fn header(&mut self, level: usize, title: &str, anchor: Option<&str>, skip_toc: bool) -> String {
        let anchor = anchor.map(str::to_string).unwrap_or_else(|| title_anchor(title));
        let line = heading_line(level, title, &anchor, skip_toc);
        if !self.numberer.is_enabled() {
            self.unnumbered.push(line.clone());
        }
        format!("\n\n\n{line}\n\n")
    }

    /// Consumes one recorded occurrence of `line`, if any.
    pub fn take_unnumbered(&mut self, line: &str) -> bool {
        match self.unnumbered.iter().position(|l| l == line) {
            Some(pos) => {
                self.unnumbered.remove(pos);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_disabled_window_when_emitting_headers_then_only_those_recorded() {
        // Arrange
        let mut ctx = RenderContext::new();

        // Act
        ctx.disable_numbering();
        let title = ctx.header(1, "Root Threat Model", Some("Root"), true);
        ctx.enable_numbering();
        let scope = ctx.header(2, "Root - scope of analysis", None, false);

        // Assert
        assert!(title.contains("# Root Threat Model"));
        assert!(scope.ends_with("## Root - scope of analysis <a id='root---scope-of-analysis'></a>\n\n"));
        assert!(ctx.take_unnumbered(
            "# Root Threat Model   <div class='skipTOC'></div> <a id='Root'></a>"
        ));
        assert!(!ctx.take_unnumbered("## Root - scope of analysis <a id='root---scope-of-analysis'></a>"));
    }
}
