//! Plain text tables.

/// Lay out `rows` under `headers`, every column as wide as its widest cell
/// plus two spaces.
pub fn text_table<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.as_ref().chars().count()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            match widths.get_mut(index) {
                Some(current) => *current = (*current).max(width),
                None => widths.push(width),
            }
        }
    }
    let widths: Vec<usize> = widths.into_iter().map(|width| width + 2).collect();

    let format_row = |cells: Vec<&str>| {
        let line: String = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        line.trim_end().to_string()
    };

    let mut out = format_row(headers.iter().map(AsRef::as_ref).collect());
    out.push('\n');
    out.push_str(&"-".repeat(widths.iter().sum::<usize>().saturating_sub(2)));
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}
