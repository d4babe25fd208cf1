//! Catalog inline markup to Markdown links.
//!
//! Guide text references other pages as `[kind|target|label]`, optionally
//! with trailing `key=value` flags. These become `[label](url)`.

use regex_lite::{Captures, Regex};
use std::sync::LazyLock;

const SITE: &str = "https://www.ifixit.com";

static INLINE_LINK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[([a-z_]+)\|([^|\]]+)((?:\|[^|\]]*)*)\]").ok());

fn url_for(kind: &str, target: &str) -> String {
    let target = target.trim();
    match kind {
        "link" | "url" => {
            if target.starts_with("http://") || target.starts_with("https://") {
                target.to_string()
            } else {
                format!("{SITE}/{}", target.trim_start_matches('/'))
            }
        }
        "guide" => format!("{SITE}/Guide/_/{target}"),
        "product" => format!("{SITE}/products/{target}"),
        "device" | "wiki" => format!("{SITE}/Device/{}", target.replace(' ', "_")),
        "user" => format!("{SITE}/User/{target}"),
        _ => format!("{SITE}/{kind}/{}", target.replace(' ', "_")),
    }
}

fn replace(caps: &Captures<'_>) -> String {
    let kind = &caps[1];
    let target = &caps[2];
    let label = caps
        .get(3)
        .map(|m| m.as_str())
        .unwrap_or("")
        .split('|')
        .map(str::trim)
        .find(|part| !part.is_empty() && !part.contains('='))
        .unwrap_or(target.trim());
    format!("[{label}]({})", url_for(kind, target))
}

/// Rewrite every inline link in `text`.
pub fn to_markdown(text: &str) -> String {
    match INLINE_LINK.as_ref() {
        Some(re) => re.replace_all(text, replace).into_owned(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_link() {
        assert_eq!(
            to_markdown("See [guide|1234|Battery Replacement] first."),
            "See [Battery Replacement](https://www.ifixit.com/Guide/_/1234) first."
        );
    }

    #[test]
    fn external_link_with_flags() {
        assert_eq!(
            to_markdown("[link|https://example.com/esd|ESD safety|new_window=true]"),
            "[ESD safety](https://example.com/esd)"
        );
    }

    #[test]
    fn missing_label_uses_target() {
        assert_eq!(
            to_markdown("[product|IF145-020]"),
            "[IF145-020](https://www.ifixit.com/products/IF145-020)"
        );
    }

    #[test]
    fn plain_brackets_are_untouched() {
        let text = "Remove the [two] screws and [Step 3] notes.";
        assert_eq!(to_markdown(text), text);
    }

    #[test]
    fn device_link_uses_underscores() {
        assert_eq!(
            to_markdown("[device|PlayStation 5|PS5]"),
            "[PS5](https://www.ifixit.com/Device/PlayStation_5)"
        );
    }
}
