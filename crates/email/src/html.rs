use std::sync::OnceLock;

use regex::Regex;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_html_marker, r"(?i)<(?:html|body|table|td|div|br|p)\b");
re!(re_drop_blocks, r"(?is)<(script|style|head)\b.*?</(?:script|style|head)\s*>");
re!(re_line_break, r"(?i)<br\s*/?>|</(?:p|div|tr|td|th|li|h[1-6]|table)\s*>");
re!(re_tag, r"(?s)<[^>]*>");
re!(re_numeric_entity, r"&#(\d+);");

/// Whether a message body looks like HTML rather than plain text.
pub fn looks_like_html(body: &str) -> bool {
    re_html_marker().is_match(body)
}

/// Reduce an HTML email body to one text line per cell / paragraph, which is
/// the shape the report parser expects.
pub fn html_to_text(html: &str) -> String {
    let text = re_drop_blocks().replace_all(html, "");
    let text = re_line_break().replace_all(&text, "\n");
    let text = re_tag().replace_all(&text, "");
    let text = decode_entities(&text);

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(s: &str) -> String {
    let s = re_numeric_entity().replace_all(s, |caps: &regex::Captures| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
