//! Markdown to HTML conversion that leaves TeX math untouched.

use comrak::options::Options;

const INLINE_MATH: (&str, &str) = ("\\(", "\\)");
const DISPLAY_MATH: (&str, &str) = ("$$", "$$");

#[derive(Debug, Clone)]
pub struct MarkupTransformer {
    options: Options<'static>,
}

impl Default for MarkupTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupTransformer {
    pub fn new() -> Self {
        let mut options = Options::default();
        configure_extensions(&mut options);
        Self { options }
    }

    /// Render markdown, passing `\(..\)` and `$$..$$` spans through verbatim.
    pub fn render(&self, markdown: &str) -> String {
        let (protected, fragments) = extract_math(markdown);
        let html = comrak::markdown_to_html(&protected, &self.options);
        restore_math(html, &fragments)
    }
}

fn configure_extensions(options: &mut Options<'static>) {
    let ext = &mut options.extension;
    ext.footnotes = true;
    ext.table = true;
    ext.strikethrough = true;
    ext.autolink = true;

    options.parse.smart = true;

    // Authors embed raw HTML (figures, iframes) in entries.
    options.render.r#unsafe = true;
}

fn placeholder(index: usize) -> String {
    format!("FLOGMATH{index}X")
}

fn extract_math(text: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(text.len());
    let mut fragments = Vec::new();
    let mut rest = text;

    loop {
        let next = [INLINE_MATH, DISPLAY_MATH]
            .iter()
            .filter_map(|&(open, close)| rest.find(open).map(|at| (at, open, close)))
            .min_by_key(|(at, _, _)| *at);
        let Some((start, open, close)) = next else {
            break;
        };
        let body_start = start + open.len();
        let Some(len) = rest[body_start..].find(close) else {
            break;
        };
        let end = body_start + len + close.len();

        out.push_str(&rest[..start]);
        out.push_str(&placeholder(fragments.len()));
        fragments.push(rest[start..end].to_string());
        rest = &rest[end..];
    }

    out.push_str(rest);
    (out, fragments)
}

fn restore_math(html: String, fragments: &[String]) -> String {
    fragments
        .iter()
        .enumerate()
        .fold(html, |acc, (index, fragment)| {
            acc.replace(&placeholder(index), fragment)
        })
}
