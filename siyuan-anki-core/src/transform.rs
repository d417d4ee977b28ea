//! Content transform: SiYuan kramdown → Anki-ready HTML.
//!
//! The pipeline runs in a fixed order and every step is a small grammar of its own:
//!
//! | step | pattern | rewrite |
//! |------|---------|---------|
//! | 1 | `\n\n` | `\n` |
//! | 2 | `{: ... "}` (inline attribute list) | a single space |
//! | 3 | `(assets/<asset>)` | `(<asset>)` |
//! | 4 | `((<block-id> "label"))` | `[label](siyuan://blocks/<block-id>)` |
//! | 5 | markdown | HTML |
//! | 6 | `$$tex$$`, then `$tex$` | `\[tex\]`, `\(tex\)` |
//!
//! `<asset>` is SiYuan's generated asset name `[\w-]*\d{14}-\S{7}\.\w+` and
//! `<block-id>` is `\d{14}-\S{7}`. Math runs on the rendered HTML because the
//! markdown renderer would otherwise treat `\(` as an escaped parenthesis.

use std::sync::OnceLock;

use pulldown_cmark::{html, Options, Parser};
use regex::{Captures, Regex};

/// Deep-link scheme that opens a block in SiYuan.
pub const DEEP_LINK_PREFIX: &str = "siyuan://blocks/";

/// Label of the link appended to every front face.
pub const SOURCE_LINK_LABEL: &str = "SiYuanURL";

/// Generated asset file name: optional stem, 14-digit timestamp, 7-char suffix, extension.
pub const ASSET_NAME_PATTERN: &str = r"[\w-]*\d{14}-\S{7}\.\w+";

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new(&$pattern).expect("static pattern compiles"))
        }
    };
}

static_regex!(ial_re, r#"\{:[^}]*"\}"#);
static_regex!(asset_link_re, format!(r"\(assets/({ASSET_NAME_PATTERN})\)"));
static_regex!(
    block_ref_re,
    r#"\(\((\d{14}-\S{7}) ['"]([^'"]+)['"]\)\)"#
);
static_regex!(display_math_re, r"\$\$([^$]+)\$\$");
static_regex!(inline_math_re, r"\$([^$]+)\$");

/// Replaces every match of `re` whose preceding character is not in `excluded`.
///
/// The preceding character is inspected, never consumed, so back-to-back matches
/// are all rewritten. When `rewrite` returns `None` the match is dropped and the
/// search resumes one character later.
fn replace_unescaped<F>(re: &Regex, text: &str, excluded: &[char], mut rewrite: F) -> String
where
    F: FnMut(&Captures, &str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;
    while let Some(caps) = re.captures_at(text, pos) {
        let Some(m) = caps.get(0) else { break };
        let escaped = text[..m.start()]
            .chars()
            .next_back()
            .is_some_and(|prev| excluded.contains(&prev));
        let replacement = if escaped {
            None
        } else {
            rewrite(&caps, &text[m.end()..])
        };
        match replacement {
            Some(replacement) => {
                out.push_str(&text[copied..m.start()]);
                out.push_str(&replacement);
                copied = m.end();
                pos = m.end();
            }
            None => {
                let step = text[m.start()..].chars().next().map_or(1, char::len_utf8);
                pos = m.start() + step;
            }
        }
        if pos >= text.len() {
            break;
        }
    }
    out.push_str(&text[copied..]);
    out
}

/// Regex matching `(assets/<asset>)`, capturing the bare file name in group 1.
pub(crate) fn asset_link_regex() -> &'static Regex {
    asset_link_re()
}

pub fn deep_link(block_id: &str) -> String {
    format!("{DEEP_LINK_PREFIX}{block_id}")
}

/// Step 1: SiYuan separates every block with a blank line; collapse to single breaks.
pub fn collapse_blank_lines(text: &str) -> String {
    text.replace("\n\n", "\n")
}

/// Step 2: drop inline attribute lists such as `{: id="..." updated="..."}`.
pub fn strip_ial(text: &str) -> String {
    ial_re().replace_all(text, " ").into_owned()
}

/// Step 3: media is uploaded to Anki by bare file name, so the `assets/` prefix goes.
pub fn strip_asset_prefix(text: &str) -> String {
    asset_link_re()
        .replace_all(text, |c: &Captures| format!("({})", &c[1]))
        .into_owned()
}

/// Step 4: block references become markdown links to the referenced block.
pub fn rewrite_block_refs(text: &str) -> String {
    replace_unescaped(block_ref_re(), text, &['\\'], |c, _| {
        Some(format!("[{}]({})", &c[2], deep_link(&c[1])))
    })
}

/// Step 5.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Step 6: `$$tex$$` → `\[tex\]`, then `$tex$` → `\(tex\)`. A delimiter preceded by
/// `\` never opens, nor does an inline one preceded by `&`. An inline match directly
/// followed by `$` is skipped and the search retries from the next character.
pub fn rewrite_math(html: &str) -> String {
    let display = replace_unescaped(display_math_re(), html, &['\\'], |c, _| {
        Some(format!("\\[{}\\]", &c[1]))
    });
    replace_unescaped(inline_math_re(), &display, &['\\', '&'], |c, rest| {
        (!rest.starts_with('$')).then(|| format!("\\({}\\)", &c[1]))
    })
}

/// Steps 1–6 on one body of text.
pub fn to_html(markdown: &str) -> String {
    if markdown.is_empty() {
        return String::new();
    }
    let cleaned = rewrite_block_refs(&strip_asset_prefix(&strip_ial(&collapse_blank_lines(
        markdown,
    ))));
    rewrite_math(&render_markdown(&cleaned))
}

/// Front face: the passage body followed by a link back to the block.
pub fn render_front(markdown: &str, block_id: &str) -> String {
    format!(
        "{}<p><a href=\"{}\">{SOURCE_LINK_LABEL}</a></p>",
        to_html(markdown),
        deep_link(block_id)
    )
}

/// Back face: the parent block body, empty when there is no eligible parent.
pub fn render_back(parent_markdown: &str) -> String {
    to_html(parent_markdown)
}
