pub(super) fn push_line(out: &mut String, indent: usize, line: &str) {
    push_block(out, indent, line);
}

pub(super) fn push_blank(out: &mut String) {
    out.push('\n');
}

/// Appends `block`, stripping its common leading whitespace and re-indenting
/// it by `indent` levels. Leading and trailing blank lines are dropped.
pub(super) fn push_block(out: &mut String, indent: usize, block: &str) {
    if block.is_empty() {
        return;
    }
    let pad = "  ".repeat(indent);
    let mut lines: Vec<&str> = block.split('\n').collect();
    if matches!(lines.first(), Some(line) if line.trim().is_empty()) {
        lines.remove(0);
    }
    if matches!(lines.last(), Some(line) if line.trim().is_empty()) {
        lines.pop();
    }

    let min_indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.chars().take_while(|c| *c == ' ' || *c == '\t').count())
        .min()
        .unwrap_or(0);

    for line in lines {
        let trimmed = line.get(min_indent..).unwrap_or("");
        if trimmed.trim().is_empty() {
            out.push('\n');
            continue;
        }
        out.push_str(&pad);
        out.push_str(trimmed);
        out.push('\n');
    }
}

pub(super) fn join_ints<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
