//! Markup removal for free-text descriptions.
//!
//! The input is parsed as an HTML fragment with `scraper`, every element is
//! dropped (its text is kept), and the contents of script-capable or raw
//! text elements are discarded entirely. The remaining text is re-encoded
//! so it can be embedded in HTML without being interpreted as markup.
//!
//! Parsing the encoded output again yields the same text, which makes
//! [`sanitize`] idempotent.

use scraper::{Html, Node};

/// Elements whose entire contents are discarded rather than kept as text.
const DROPPED_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "noembed", "noframes", "template",
    "textarea", "title", "xmp",
];

/// Strips all markup from `raw`, returning entity-encoded plain text.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let mut text = String::with_capacity(raw.len());

    for node in fragment.root_element().descendants() {
        let Node::Text(t) = node.value() else {
            continue;
        };

        let dropped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| DROPPED_ELEMENTS.contains(&el.name()))
        });
        if dropped {
            continue;
        }

        text.push_str(t);
    }

    let sanitized = encode_text(&text);
    if sanitized != raw {
        log::trace!("Sanitized description ({} -> {} bytes)", raw.len(), sanitized.len());
    }
    sanitized
}

fn encode_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn plain_text_is_unchanged() {
        let s = "Water level rising fast near the river";
        assert_eq!(sanitize(s), s);
    }

    #[test]
    fn strips_tags_but_keeps_text() {
        assert_eq!(
            sanitize("<b>Bridge</b> <i>collapsed</i> near <a href=\"x\">Main St</a>"),
            "Bridge collapsed near Main St"
        );
    }

    #[test]
    fn drops_script_and_style_contents() {
        assert_eq!(
            sanitize("Road flooded<script>alert('x')</script><style>p{}</style>!"),
            "Road flooded!"
        );
    }

    #[test]
    fn drops_event_handler_attributes_with_their_element() {
        assert_eq!(
            sanitize("<img src=x onerror=alert(1)>Tree down on cables"),
            "Tree down on cables"
        );
    }

    #[test]
    fn escapes_decoded_entities() {
        assert_eq!(sanitize("a &lt;b&gt; &amp; c"), "a &lt;b&gt; &amp; c");
        assert_eq!(sanitize("rocks & mud"), "rocks &amp; mud");
        assert_eq!(sanitize("depth > 2m"), "depth &gt; 2m");
    }

    #[test]
    fn markup_only_input_sanitizes_to_empty() {
        assert_eq!(sanitize("<script>aaaaaaaaaaaa</script>"), "");
        assert_eq!(sanitize("<p></p><br><hr>"), "");
    }

    #[test]
    fn idempotent_on_known_inputs() {
        for s in [
            "&amp;lt;script&amp;gt;",
            "&lt;script&gt;alert(1)&lt;/script&gt;",
            "<<b>>",
            "a\r\nb",
            "<textarea><b>x</b></textarea>tail",
            "<![CDATA[x]]>",
            "&notit; &copy",
        ] {
            let once = sanitize(s);
            assert_eq!(sanitize(&once), once, "input {s:?}");
        }
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(s in any::<String>()) {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn sanitize_is_idempotent_on_markup(
            s in "(<[a-z]{1,8}( [a-z]+=\"[^\"]*\")?>|</[a-z]{1,8}>|&[a-z#0-9]{1,6};?|[a-zA-Z <>&;\"'/=]){0,40}"
        ) {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn sanitized_output_has_no_tags(s in any::<String>()) {
            let out = sanitize(&s);
            prop_assert!(!out.contains('<'));
            prop_assert!(!out.contains('>'));
        }
    }
}
