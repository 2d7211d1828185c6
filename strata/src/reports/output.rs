//! Output trait for rendering reports to different formats.

/// Target output for reports.
///
/// Reports describe *what* to output using these semantic methods.
/// Implementations decide *how* to render.
pub trait Output {
    /// Start a new section with a heading.
    fn section(&mut self, name: &str);

    /// Render a key-value pair.
    fn key_value(&mut self, key: &str, value: &str);

    /// Render a bullet list item.
    fn list_item(&mut self, text: &str);

    /// Render an added item (e.g., a written file).
    fn added_item(&mut self, text: &str);

    /// Render a removed item (e.g., a skipped resource).
    fn removed_item(&mut self, text: &str);

    /// Render a fully formatted compiler diagnostic.
    fn diagnostic(&mut self, rendered: &str);

    /// Render a separator/divider with a label.
    fn divider(&mut self, label: &str);

    /// Render a block of preformatted text.
    fn preformatted(&mut self, text: &str);

    /// Render a blank line.
    fn newline(&mut self);
}

/// A report that can render itself to an output.
pub trait Report {
    /// Render this report to the given output.
    fn render(&self, out: &mut dyn Output);
}

/// Terminal output: results on stdout, diagnostics on stderr.
pub struct TerminalOutput;

impl TerminalOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Output for TerminalOutput {
    fn section(&mut self, name: &str) {
        println!("{}:", name);
    }

    fn key_value(&mut self, key: &str, value: &str) {
        println!("{}: {}", key, value);
    }

    fn list_item(&mut self, text: &str) {
        println!("  - {}", text);
    }

    fn added_item(&mut self, text: &str) {
        println!("  + {}", text);
    }

    fn removed_item(&mut self, text: &str) {
        println!("  - {}", text);
    }

    fn diagnostic(&mut self, rendered: &str) {
        eprintln!("{}", rendered);
    }

    fn divider(&mut self, label: &str) {
        println!("── {} ──", label);
    }

    fn preformatted(&mut self, text: &str) {
        println!("{}", text);
    }

    fn newline(&mut self) {
        println!();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Output;

    /// Output that records every call as a line of text.
    #[derive(Default)]
    pub struct RecordingOutput {
        pub stdout: Vec<String>,
        pub stderr: Vec<String>,
    }

    impl Output for RecordingOutput {
        fn section(&mut self, name: &str) {
            self.stdout.push(format!("{name}:"));
        }

        fn key_value(&mut self, key: &str, value: &str) {
            self.stdout.push(format!("{key}: {value}"));
        }

        fn list_item(&mut self, text: &str) {
            self.stdout.push(format!("  - {text}"));
        }

        fn added_item(&mut self, text: &str) {
            self.stdout.push(format!("  + {text}"));
        }

        fn removed_item(&mut self, text: &str) {
            self.stdout.push(format!("  - {text}"));
        }

        fn diagnostic(&mut self, rendered: &str) {
            self.stderr.push(rendered.to_string());
        }

        fn divider(&mut self, label: &str) {
            self.stdout.push(format!("── {label} ──"));
        }

        fn preformatted(&mut self, text: &str) {
            self.stdout.push(text.to_string());
        }

        fn newline(&mut self) {
            self.stdout.push(String::new());
        }
    }
}
