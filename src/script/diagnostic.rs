use super::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A compile-time problem found in script source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub title: String,
    pub message: Option<String>,
    pub position: Option<Position>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn error(title: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            message: None,
            position: None,
            hints: Vec::new(),
        }
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(title)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Renders the diagnostic the way the engine reports it as an exception.
    ///
    /// The first line always reads `<kind> at <file> line L, column C: <title>`,
    /// followed by the offending source line with a caret when available.
    pub fn render(&self, source: Option<&str>, file: &str) -> String {
        let kind = match self.severity {
            Severity::Error => "syntax error",
            Severity::Warning => "warning",
        };

        let mut out = match self.position {
            Some(position) => format!(
                "{} at {} line {}, column {}: {}\n",
                kind,
                file,
                position.line,
                position.column + 1,
                self.title
            ),
            None => format!("{} at {}: {}\n", kind, file, self.title),
        };

        if let Some(message) = &self.message {
            out.push_str(&format!("  {}\n", message));
        }

        if let Some(position) = self.position
            && let Some(line_text) = source.and_then(|src| get_source_line(src, position.line))
        {
            let gutter = position.line.to_string();
            let caret_indent = position.column.min(line_text.len());
            out.push_str(&format!("{} | {}\n", gutter, line_text));
            out.push_str(&format!(
                "{:>width$} | {}^\n",
                "",
                " ".repeat(caret_indent),
                width = gutter.len()
            ));
        }

        for hint in &self.hints {
            out.push_str(&format!("Hint: {}\n", hint));
        }

        out
    }
}

fn get_source_line(source: &str, line: usize) -> Option<&str> {
    if line == 0 {
        return None;
    }

    source.lines().nth(line.saturating_sub(1))
}
