//! HTML sanitization applied to values that may later be rendered.

/// Capability port for scrubbing client-supplied strings. Implementations
/// must be idempotent: `sanitize(sanitize(s)) == sanitize(s)`.
pub trait XssSanitizer: Send + Sync {
    fn sanitize(&self, input: &str) -> String;
}

/// Sanitizer that removes active content rather than escaping it, which
/// keeps repeated passes stable. Strips `script`, `iframe`, `object`, and
/// `embed` elements along with `javascript:` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlScrubber;

const BLOCKED_ELEMENTS: &[(&str, &str)] = &[
    ("<script", "</script>"),
    ("<iframe", "</iframe>"),
    ("<object", "</object>"),
    ("<embed", "</embed>"),
];

impl XssSanitizer for HtmlScrubber {
    fn sanitize(&self, input: &str) -> String {
        let mut output = input.to_string();

        for (open, close) in BLOCKED_ELEMENTS {
            output = strip_element(&output, open, close);
        }

        strip_token(&output, "javascript:")
    }
}

/// Remove every occurrence of an element from its opening tag through its
/// closing tag. An unclosed opening tag swallows the rest of the input.
fn strip_element(input: &str, open: &str, close: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    loop {
        match find_ignore_case(rest, open) {
            Some(start) => {
                output.push_str(&rest[..start]);
                let after_open = &rest[start..];

                match find_ignore_case(after_open, close) {
                    Some(end) => rest = &after_open[end + close.len()..],
                    None => return output,
                }
            }
            None => {
                output.push_str(rest);
                return output;
            }
        }
    }
}

fn strip_token(input: &str, token: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = find_ignore_case(rest, token) {
        output.push_str(&rest[..start]);
        rest = &rest[start + token.len()..];
    }

    output.push_str(rest);
    output
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let haystack_lower = haystack.to_ascii_lowercase();
    haystack_lower.find(&needle.to_ascii_lowercase())
}
