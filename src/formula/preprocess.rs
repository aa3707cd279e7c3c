//! Rewrites inline formulas into `<img>` references before text reaches the model.

use crate::error::Result;
use crate::formula::FormulaRenderer;

use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// `$...$`, `\[...\]` and `\(...\)` stay on one line; the equation block may span lines.
static FORMULA_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\$(?P<dollar>[^$\n]+?)\$",
        r"|\\\[(?P<bracket>[^\n]+?)\\\]",
        r"|\\\((?P<paren>[^\n]+?)\\\)",
        r"|\\begin\{equation\}(?P<equation>(?s:.*?))\\end\{equation\}",
    ))
    .expect("hardcoded formula regex")
});

/// A recognized formula inside a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaSpan<'a> {
    /// Byte range of the whole span, delimiters included.
    pub range: Range<usize>,
    /// The span as written, delimiters included.
    pub source: &'a str,
    /// The formula between the delimiters.
    pub content: &'a str,
}

/// All formula spans in `text`, leftmost-first and non-overlapping.
pub fn find_spans(text: &str) -> Vec<FormulaSpan<'_>> {
    FORMULA_REGEX
        .captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let content = ["dollar", "bracket", "paren", "equation"]
                .iter()
                .find_map(|name| captures.name(name))?;
            Some(FormulaSpan {
                range: whole.range(),
                source: whole.as_str(),
                content: content.as_str(),
            })
        })
        .collect()
}

/// Replace every formula span with an image rendered by `renderer`.
///
/// Spans are rendered in order. The first render failure aborts the whole
/// message; no partially substituted text is ever returned.
pub async fn preprocess<R>(text: &str, renderer: &R) -> Result<String>
where
    R: FormulaRenderer + ?Sized,
{
    let spans = find_spans(text);
    if spans.is_empty() {
        return Ok(text.to_string());
    }

    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        output.push_str(&text[cursor..span.range.start]);
        let url = renderer.render(span.content).await?;
        output.push_str(&image_tag(&url, span.source));
        cursor = span.range.end;
    }
    output.push_str(&text[cursor..]);

    tracing::debug!(original_len = text.len(), processed_len = output.len(), "formulas rendered");
    Ok(output)
}

fn image_tag(url: &str, alt: &str) -> String {
    format!("<img src=\"{url}\" alt=\"{alt}\"/>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Maps known formulas to URLs and records every call in order.
    #[derive(Default)]
    struct StubRenderer {
        urls: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl StubRenderer {
        fn with(pairs: &[(&str, &str)]) -> Self {
            Self {
                urls: pairs
                    .iter()
                    .map(|(formula, url)| (formula.to_string(), url.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl FormulaRenderer for StubRenderer {
        async fn render(&self, formula: &str) -> Result<String> {
            self.calls.lock().push(formula.to_string());
            self.urls.get(formula).cloned().ok_or_else(|| {
                RenderError::Status {
                    status: 500,
                    formula: formula.to_string(),
                }
                .into()
            })
        }
    }

    #[tokio::test]
    async fn replaces_dollar_formula_and_keeps_surrounding_text() {
        let renderer = StubRenderer::with(&[("E=mc^2", "http://img/1")]);

        let output = preprocess("Energy: $E=mc^2$ done", &renderer)
            .await
            .expect("render succeeds");

        assert_eq!(output, r#"Energy: <img src="http://img/1" alt="$E=mc^2$"/> done"#);
    }

    #[tokio::test]
    async fn text_without_formulas_is_unchanged() {
        let renderer = StubRenderer::default();
        let text = "no math here, just 5 dollars and (parentheses) [brackets]";

        let output = preprocess(text, &renderer).await.expect("nothing to render");

        assert_eq!(output, text);
        assert!(renderer.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn renders_every_form_in_order() {
        let renderer = StubRenderer::with(&[
            ("a", "u1"),
            ("b", "u2"),
            ("c", "u3"),
            ("x\n+ y", "u4"),
        ]);
        let text = "1 $a$ 2 \\[b\\] 3 \\(c\\) 4 \\begin{equation}x\n+ y\\end{equation} 5";

        let output = preprocess(text, &renderer).await.expect("render succeeds");

        assert_eq!(
            output,
            "1 <img src=\"u1\" alt=\"$a$\"/> 2 <img src=\"u2\" alt=\"\\[b\\]\"/> \
             3 <img src=\"u3\" alt=\"\\(c\\)\"/> \
             4 <img src=\"u4\" alt=\"\\begin{equation}x\n+ y\\end{equation}\"/> 5"
        );
        assert_eq!(*renderer.calls.lock(), vec!["a", "b", "c", "x\n+ y"]);
    }

    #[tokio::test]
    async fn failure_aborts_whole_message() {
        let renderer = StubRenderer::with(&[("ok", "http://img/ok")]);

        let error = preprocess("$ok$ then $broken$ then $ok$", &renderer)
            .await
            .expect_err("second span fails");

        assert!(error.to_string().contains("broken"));
        // Rendering stops at the failing span.
        assert_eq!(*renderer.calls.lock(), vec!["ok", "broken"]);
    }

    #[test]
    fn dollar_spans_do_not_cross_lines() {
        assert!(find_spans("costs $5\nand $6").is_empty());
    }

    #[test]
    fn non_greedy_matching_keeps_spans_separate() {
        let spans = find_spans("$a$ and $b$");

        let contents: Vec<_> = spans.iter().map(|s| s.content).collect();
        assert_eq!(contents, vec!["a", "b"]);
        assert_eq!(spans[1].source, "$b$");
        assert_eq!(spans[1].range, 8..11);
    }

    #[test]
    fn leftmost_span_wins_over_later_alternatives() {
        let spans = find_spans(r"\(x $y\) z$");

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].source, r"\(x $y\)");
        assert_eq!(spans[0].content, "x $y");
    }

    #[test]
    fn empty_dollar_pair_is_not_a_formula() {
        assert!(find_spans("$$").is_empty());
    }
}
