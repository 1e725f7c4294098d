//! Indenting text buffer for generated source.

/// Accumulates lines of generated code at the current indentation.
#[derive(Debug, Clone)]
pub struct CodeWriter {
    out: String,
    level: usize,
    unit: &'static str,
}

impl CodeWriter {
    pub fn new(unit: &'static str) -> Self {
        CodeWriter {
            out: String::new(),
            level: 0,
            unit,
        }
    }

    /// Writes `text` as one or more lines. Every line of a multi-line `text` gets the
    /// current indentation, so nested blocks rendered separately keep their shape.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        for line in text.as_ref().split('\n') {
            if !line.is_empty() {
                for _ in 0..self.level {
                    self.out.push_str(self.unit);
                }
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.level += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        self.level = self.level.saturating_sub(1);
        self
    }

    /// Writes `open`, runs `body` one level deeper, then writes `close`.
    pub fn block<E>(
        &mut self,
        open: impl AsRef<str>,
        close: impl AsRef<str>,
        body: impl FnOnce(&mut Self) -> Result<(), E>,
    ) -> Result<&mut Self, E> {
        self.line(open);
        self.indent();
        body(self)?;
        self.dedent();
        self.line(close);
        Ok(self)
    }

    /// A writer with the same indentation unit, starting at level zero.
    pub fn nested(&self) -> Self {
        CodeWriter::new(self.unit)
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    pub fn finish(self) -> String {
        self.out
    }

    /// Text written so far, without the final newline.
    pub fn finish_trimmed(self) -> String {
        let mut out = self.out;
        while out.ends_with('\n') {
            out.pop();
        }
        out
    }
}
