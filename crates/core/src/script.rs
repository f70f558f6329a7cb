//! Script detection and removal.
//!
//! Pattern-based, like the rest of the sanitizers: markup is never
//! executed, and the heuristics only need to be good enough to tell the
//! user a page will probably look broken without JavaScript.

use regex::Regex;
use std::sync::LazyLock;

/// More `<script` occurrences than this marks a page as script-heavy.
pub const SCRIPT_COUNT_THRESHOLD: usize = 5;

const EVENT_HANDLERS: [&str; 12] = [
    "onclick",
    "onload",
    "onerror",
    "onmouseover",
    "onmouseout",
    "onfocus",
    "onblur",
    "onchange",
    "onsubmit",
    "onkeydown",
    "onkeyup",
    "onkeypress",
];

static SCRIPT_INDICATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)<noscript[^>]*>.*please enable javascript.*</noscript>",
        r#"(?is)<[a-z][a-z0-9]*\s[^>]*class\s*=\s*["'][^"']*js-required"#,
        r"(?i)document\.write",
        r"(?i)window\.onload",
        r"(?is)<script[^>]*src\s*=",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("static regex"))
    .collect()
});

static SCRIPT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<script").expect("static regex"));

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script\s*>").expect("static regex"));

static EVENT_HANDLER_DOUBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"(?i)(?:{})="[^"]*""#, EVENT_HANDLERS.join("|"))).expect("static regex")
});

static EVENT_HANDLER_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?:{})='[^']*'", EVENT_HANDLERS.join("|"))).expect("static regex")
});

static JS_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href=(?:"javascript:[^"]*"|'javascript:[^']*')"#).expect("static regex")
});

/// Heuristic: does this page likely depend on client-side scripting?
pub fn detect_script_requirement(html: &str) -> bool {
    if SCRIPT_INDICATORS.iter().any(|re| re.is_match(html)) {
        return true;
    }
    SCRIPT_OPEN.find_iter(html).count() > SCRIPT_COUNT_THRESHOLD
}

fn strip_once(html: &str) -> String {
    let html = SCRIPT_BLOCK.replace_all(html, "");
    let html = EVENT_HANDLER_DOUBLE.replace_all(&html, "");
    let html = EVENT_HANDLER_SINGLE.replace_all(&html, "");
    JS_HREF.replace_all(&html, r##"href="#""##).into_owned()
}

/// Remove script blocks, inline event handlers and `javascript:` links.
///
/// Runs to a fixpoint, since removing one construct can splice together
/// another (`<scr<script></script>ipt>`). Every rewrite shortens the
/// document, so the loop terminates.
pub fn strip_scripts(html: &str) -> String {
    let mut current = strip_once(html);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Returns the processed html and whether the input needed scripts.
///
/// Detection always looks at the untouched input.
pub fn apply(html: &str, script_allowed: bool) -> (String, bool) {
    let requires_script = detect_script_requirement(html);
    let processed = if script_allowed {
        html.to_string()
    } else {
        strip_scripts(html)
    };
    (processed, requires_script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_indicator_patterns_compile() {
        assert_eq!(SCRIPT_INDICATORS.len(), 5);
    }

    #[test]
    fn spliced_script_is_removed_in_one_call() {
        let html = "<p>a</p><scr<script></script>ipt>alert(1)</script><p>b</p>";
        assert_eq!(strip_scripts(html), "<p>a</p><p>b</p>");
    }
}
