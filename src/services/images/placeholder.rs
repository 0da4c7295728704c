//! In-order substitution of image placeholders with downloaded filenames.

use crate::utils::text::IMAGE_PLACEHOLDER;

/// Render a resolved placeholder, e.g. `[图片:answer_001.jpg]`.
pub fn resolved_placeholder(filename: &str) -> String {
    format!("[图片:{filename}]")
}

/// Replace placeholders in `text` with `filenames`, strictly in order.
///
/// Surplus placeholders stay as they are; surplus filenames are ignored.
/// Returns the rewritten text and how many filenames were consumed.
pub fn substitute_placeholders(text: &str, filenames: &[String]) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut remaining = text;
    let mut consumed = 0;

    while consumed < filenames.len() {
        let Some(pos) = remaining.find(IMAGE_PLACEHOLDER) else {
            break;
        };
        out.push_str(&remaining[..pos]);
        out.push_str(&resolved_placeholder(&filenames[consumed]));
        remaining = &remaining[pos + IMAGE_PLACEHOLDER.len()..];
        consumed += 1;
    }
    out.push_str(remaining);
    (out, consumed)
}

/// Substitute across several texts, continuing the filename sequence from one
/// text to the next. Returns the total consumed.
pub fn substitute_in_order<'a, I>(texts: I, filenames: &[String]) -> usize
where
    I: IntoIterator<Item = &'a mut String>,
{
    let mut consumed = 0;
    for text in texts {
        if consumed == filenames.len() {
            break;
        }
        let (rewritten, used) = substitute_placeholders(text, &filenames[consumed..]);
        *text = rewritten;
        consumed += used;
    }
    consumed
}
