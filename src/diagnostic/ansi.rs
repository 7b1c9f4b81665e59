use super::Diagnostic;

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn bold(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold_red(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[1;31m{s}\x1b[0m") } else { s.to_string() }
    }

    fn cyan(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[36m{s}\x1b[0m") } else { s.to_string() }
    }

    fn dim(&self, s: &str) -> String {
        if self.use_color { format!("\x1b[2m{s}\x1b[0m") } else { s.to_string() }
    }

    /// `headline` in bold, then the snippet.
    pub fn render(&self, headline: &str, d: &Diagnostic) -> String {
        let mut out = format!("{}\n", self.bold(headline));
        out.push_str(&self.render_snippet(d));
        out
    }

    /// Everything after the header line: source excerpt, labels and notes.
    pub fn render_snippet(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        if let (Some(label), Some(file)) = (d.primary(), &d.source) {
            let line = label.row as usize;
            let line_text = file.line_text(line);

            out.push_str(&format!("  {} {}:{}\n", self.cyan("-->"), label.row, label.col));

            let gutter = line.to_string().len();
            let pipe = self.cyan("|");
            let pad = " ".repeat(gutter);

            out.push_str(&format!("{pad} {pipe}\n"));
            let line_num = self.cyan(&format!("{line:>gutter$}"));
            out.push_str(&format!("{line_num} {pipe} {line_text}\n"));

            let span_len = label.span.map(|s| s.end.saturating_sub(s.start)).unwrap_or(1).max(1);
            let carets = self.bold_red(&"^".repeat(span_len));
            let indent = " ".repeat((label.col as usize).saturating_sub(1));
            if label.message.is_empty() {
                out.push_str(&format!("{pad} {pipe} {indent}{carets}\n"));
            } else {
                out.push_str(&format!("{pad} {pipe} {indent}{carets} {}\n", self.bold_red(&label.message)));
            }
            out.push_str(&format!("{pad} {pipe}\n"));
        }

        for label in d.labels.iter().filter(|l| !l.is_primary) {
            out.push_str(&format!("  {} {} at {}:{}\n", self.dim("="), label.message, label.row, label.col));
        }

        for note in &d.notes {
            out.push_str(&format!("  {} note: {}\n", self.dim("="), note));
        }

        out
    }
}
