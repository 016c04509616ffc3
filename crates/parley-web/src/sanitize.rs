// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Markup stripping for text typed into the widget.

use std::sync::LazyLock;

use regex::Regex;

/// Elements whose content is dropped along with the tags.
static EMBEDDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|iframe|object)\b[^>]*>.*?</(script|style|iframe|object)\s*>")
        .unwrap()
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// Remove HTML tags from `text`, keeping the text between them, then escape
/// whatever markup characters are left so the result is safe to embed.
pub fn sanitize(text: &str) -> String {
    if !text.contains(['<', '>', '&', '"']) {
        return text.to_string();
    }
    let without_embedded = EMBEDDED.replace_all(text, "");
    html_escape(&TAG.replace_all(&without_embedded, ""))
}

fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_untouched() {
        assert_eq!(sanitize("just words, 100% plain"), "just words, 100% plain");
    }

    #[test]
    fn stray_markup_characters_are_escaped() {
        assert_eq!(sanitize("2 > 1 & fine"), "2 &gt; 1 &amp; fine");
        assert_eq!(sanitize("say \"hi\""), "say &#34;hi&#34;");
    }

    #[test]
    fn unterminated_tag_cannot_survive() {
        let out = sanitize("hi <img src=x onerror=alert(1) ");
        assert_eq!(out, "hi &lt;img src=x onerror=alert(1) ");
        assert!(!out.contains('<'));

        let out = sanitize("<b>ok</b> <script");
        assert_eq!(out, "ok &lt;script");
    }

    #[test]
    fn tags_are_stripped() {
        assert_eq!(sanitize("<b>bold</b> and <a href=\"x\">link</a>"), "bold and link");
        assert_eq!(sanitize("line<br/>break"), "linebreak");
    }

    #[test]
    fn scripts_lose_their_content() {
        assert_eq!(sanitize("hi<script>alert('x')</script>!"), "hi!");
        assert_eq!(sanitize("<STYLE type=\"text/css\">p{}</STYLE>ok"), "ok");
    }
}
