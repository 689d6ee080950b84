use itertools::Itertools;

/// Cells longer than this are cut and end in `...`
const MAX_CELL_WIDTH: usize = 20;

/// Format rows as a bordered, right aligned console table.
pub(crate) fn format_table<H: AsRef<str>>(header: &[H], rows: &[Vec<String>]) -> String {
    let rows = rows
        .iter()
        .map(|row| row.iter().map(|cell| truncate(cell)).collect_vec())
        .collect_vec();
    let widths = header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.as_ref().chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect_vec();

    let border = format!("+{}+\n", widths.iter().map(|w| "-".repeat(*w)).join("+"));
    let mut out = String::new();
    out.push_str(&border);
    out.push_str(&line(header.iter().map(|h| h.as_ref()), &widths));
    out.push_str(&border);
    for row in &rows {
        out.push_str(&line(row.iter().map(String::as_str), &widths));
    }
    out.push_str(&border);
    out
}

fn line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded = cells
        .zip(widths)
        .map(|(c, w)| format!("{c:>w$}", w = *w))
        .join("|");
    format!("|{padded}|\n")
}

fn truncate(cell: &str) -> String {
    if cell.chars().count() <= MAX_CELL_WIDTH {
        return cell.to_owned();
    }
    let mut cut: String = cell.chars().take(MAX_CELL_WIDTH - 3).collect();
    cut.push_str("...");
    cut
}
