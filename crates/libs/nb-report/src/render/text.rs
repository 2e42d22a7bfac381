use super::{clean_line, document::Document, table::text_table};

#[derive(Debug, Default)]
pub(crate) struct TextDocument {
    out: String,
}

impl TextDocument {
    pub fn finish(self) -> String {
        self.out
    }
}

impl Document for TextDocument {
    fn heading(&mut self, level: u8, text: &str) {
        let underline = match level {
            1 => '=',
            2 => '-',
            _ => '~',
        };
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        self.out.push_str(text);
        self.out.push('\n');
        self.out
            .push_str(&underline.to_string().repeat(text.chars().count()));
        self.out.push_str("\n\n");
    }

    fn paragraph(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        self.out.push('\n');
        self.out.push_str(&text_table(headers, rows));
        self.out.push('\n');
    }

    fn preformatted(&mut self, lines: &[String]) {
        for line in lines {
            self.out.push_str("    ");
            self.out.push_str(&clean_line(line));
            self.out.push('\n');
        }
    }

    fn image(&mut self, source: &str, alt: &str) {
        self.out.push_str(&format!("{alt}: {source}\n"));
    }
}
