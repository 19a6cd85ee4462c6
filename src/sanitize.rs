use crate::domain::Identifier;

pub const DEFAULT_MAX_TITLE_LEN: usize = 150;

pub const RESERVED: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

const PLACEHOLDER: char = '_';

/// Sanitizes a display title. The result is printable ASCII, never contains
/// a [`RESERVED`] character and is at most `max_len` characters long.
pub fn sanitize(title: &str, max_len: usize) -> String {
    let replaced = title
        .trim()
        .chars()
        .map(|ch| if RESERVED.contains(&ch) { PLACEHOLDER } else { ch })
        .take(max_len);

    let portable: String = replaced
        .map(|ch| {
            if ch == ' ' || ch.is_ascii_graphic() {
                ch
            } else {
                PLACEHOLDER
            }
        })
        .collect();

    portable.trim_end_matches(['.', ' ']).to_string()
}

pub fn cover_file_name(identifier: &Identifier, title: &str, max_len: usize) -> String {
    let title = sanitize(title, max_len);
    if title.is_empty() {
        fallback_file_name(identifier)
    } else {
        format!("{identifier} {title}.jpg")
    }
}

pub fn fallback_file_name(identifier: &Identifier) -> String {
    format!("{identifier}.jpg")
}
