use std::fmt::Write;

use super::{clean_line, document::Document};

/// Escape text for use in HTML content and attribute values.
pub(crate) fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn cell_class(text: &str) -> Option<&'static str> {
    match text {
        "Success" => Some("success"),
        "Failure" => Some("failure"),
        "Disabled" => Some("disabled"),
        "Lost" => Some("lost"),
        _ => None,
    }
}

#[derive(Debug)]
pub(crate) struct HtmlDocument {
    out: String,
}

impl HtmlDocument {
    pub fn new(title: &str) -> Self {
        let mut out = String::new();
        let _ = write!(
            out,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{}</title>\n<link rel=\"stylesheet\" href=\"../../../index.css\">\n\
             </head>\n<body>\n",
            escape(title)
        );
        Self { out }
    }

    pub fn finish(mut self) -> String {
        self.out.push_str("</body>\n</html>\n");
        self.out
    }
}

impl Document for HtmlDocument {
    fn heading(&mut self, level: u8, text: &str) {
        let _ = writeln!(self.out, "<h{level}>{}</h{level}>", escape(text));
    }

    fn paragraph(&mut self, text: &str) {
        let _ = writeln!(self.out, "<p>{}</p>", escape(text));
    }

    fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        self.out.push_str("<table>\n<tr>");
        for header in headers {
            let _ = write!(self.out, "<th>{}</th>", escape(header));
        }
        self.out.push_str("</tr>\n");
        for row in rows {
            self.out.push_str("<tr>");
            for cell in row {
                match cell_class(cell) {
                    Some(class) => {
                        let _ = write!(self.out, "<td class=\"{class}\">{}</td>", escape(cell));
                    }
                    None => {
                        let _ = write!(self.out, "<td>{}</td>", escape(cell));
                    }
                }
            }
            self.out.push_str("</tr>\n");
        }
        self.out.push_str("</table>\n");
    }

    fn preformatted(&mut self, lines: &[String]) {
        self.out.push_str("<pre>\n");
        for line in lines {
            let _ = writeln!(self.out, "{}", escape(&clean_line(line)));
        }
        self.out.push_str("</pre>\n");
    }

    fn image(&mut self, source: &str, alt: &str) {
        let _ = writeln!(
            self.out,
            "<p><img src=\"{}\" alt=\"{}\"></p>",
            escape(source),
            escape(alt)
        );
    }
}
