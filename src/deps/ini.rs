//! Line reader shared by the manifest and lock file codecs.

/// One meaningful line of an INI document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IniLine<'a> {
    Section(&'a str),
    Entry { key: &'a str, value: &'a str },
}

/// Yield `(line_number, line)` for every section header and `key = value`
/// line. Blank lines, `;`/`#` comments and lines without `=` are skipped.
pub(crate) fn ini_lines(content: &str) -> impl Iterator<Item = (usize, IniLine<'_>)> {
    content.lines().enumerate().filter_map(|(index, raw)| {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            return None;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            return Some((index + 1, IniLine::Section(name.trim())));
        }
        let (key, value) = line.split_once('=')?;
        Some((
            index + 1,
            IniLine::Entry {
                key: key.trim(),
                value: value.trim(),
            },
        ))
    })
}
