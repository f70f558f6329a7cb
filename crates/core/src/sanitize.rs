//! HTML content sanitization driven by the active policy.

use crate::policy::PolicyBundle;
use regex::Regex;
use std::sync::LazyLock;

/// Literal text left where an image used to be.
pub const IMAGE_PLACEHOLDER: &str = "[Image removed for privacy]";

static IFRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<iframe[^>]*>.*?</iframe\s*>|<iframe[^>]*>").expect("static regex")
});

static EMBED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<embed[^>]*>").expect("static regex"));

static OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<object[^>]*>.*?</object\s*>|<object[^>]*>").expect("static regex")
});

// Width and height may come in either order.
static TRACKING_PIXEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?i)<img[^>]*width=["']1["'][^>]*height=["']1["'][^>]*>"#,
        r#"|<img[^>]*height=["']1["'][^>]*width=["']1["'][^>]*>"#,
    ))
    .expect("static regex")
});

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script\s*>").expect("static regex"));

static IMG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<img[^>]*>").expect("static regex"));

/// Strip embedded content and tracking vectors.
///
/// Frames, embeds, objects and 1x1 pixels always go. Script blocks go when
/// the policy forbids JavaScript, and any remaining image is swapped for
/// [`IMAGE_PLACEHOLDER`] when the policy forbids images.
pub fn sanitize_html(html: &str, policy: &PolicyBundle) -> String {
    let mut html = if policy.javascript {
        html.to_string()
    } else {
        SCRIPT_BLOCK.replace_all(html, "").into_owned()
    };

    html = IFRAME.replace_all(&html, "").into_owned();
    html = EMBED.replace_all(&html, "").into_owned();
    html = OBJECT.replace_all(&html, "").into_owned();
    html = TRACKING_PIXEL.replace_all(&html, "").into_owned();

    if !policy.images {
        html = IMG.replace_all(&html, IMAGE_PLACEHOLDER).into_owned();
    }
    html
}
