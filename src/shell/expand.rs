//! `$NAME` / `${NAME}` expansion.
//!
//! Expansion runs on the raw line before tokenization, so a value holding
//! spaces or `|` is split again by the tokenizer. Substituted values are not
//! rescanned.

/// Replace every `${name}` and `$name` in `template` with `lookup(name)`,
/// or with the empty string when the name is unbound.
///
/// A `$` that is not followed by a name or `{`, and an unterminated `${`,
/// are copied through unchanged.
pub fn expand<F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(inner) = after.strip_prefix('{') {
            match inner.find('}') {
                Some(end) => {
                    out.push_str(&lookup(&inner[..end]).unwrap_or_default());
                    rest = &inner[end + 1..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
            continue;
        }

        let len = name_len(after);
        if len == 0 {
            out.push('$');
            rest = after;
            continue;
        }
        out.push_str(&lookup(&after[..len]).unwrap_or_default());
        rest = &after[len..];
    }

    out.push_str(rest);
    out
}

/// Length in bytes of the variable name at the start of `s`.
pub(crate) fn name_len(s: &str) -> usize {
    s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len())
}
