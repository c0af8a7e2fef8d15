//! HTML縮小（抽出サービスへ渡すペイロードを小さくする）

use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

/// 除去する要素
const STRIPPED_ELEMENTS: &str = "script, style, header, footer";

static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn whitespace() -> &'static Regex {
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
}

/// script/style/header/footer を取り除き、連続する空白を1つのスペースにまとめる
pub fn reduce_markup(html: &str) -> String {
    let mut document = Html::parse_document(html);

    if let Ok(selector) = Selector::parse(STRIPPED_ELEMENTS) {
        let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    collapse_whitespace(&document.html())
}

/// 空白の連続を1つのスペースに置き換える
pub fn collapse_whitespace(text: &str) -> String {
    whitespace().replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_script_and_whitespace() {
        let html = r#"
            <html>
              <head>
                <script>var tracking = "secret";</script>
                <style>td { color: red; }</style>
              </head>
              <body>
                <header>Navigation</header>
                <table>
                  <tr><td>John   Smith</td>
                      <td>Dallas, TX</td></tr>
                </table>
                <footer>Copyright</footer>
                <script type="text/javascript">
                    loadMore();
                </script>
              </body>
            </html>
        "#;

        let reduced = reduce_markup(html);

        assert!(!reduced.contains("tracking"));
        assert!(!reduced.contains("loadMore"));
        assert!(!reduced.contains("<script"));
        assert!(!reduced.contains("color: red"));
        assert!(!reduced.contains("Navigation"));
        assert!(!reduced.contains("Copyright"));
        assert!(reduced.contains("John Smith"));
        assert!(reduced.contains("Dallas, TX"));

        let chars: Vec<char> = reduced.chars().collect();
        assert!(chars
            .windows(2)
            .all(|w| !(w[0].is_whitespace() && w[1].is_whitespace())));
    }

    #[test]
    fn test_reduce_is_deterministic() {
        let html = "<div>\n\t<p>A</p>\n</div>";
        assert_eq!(reduce_markup(html), reduce_markup(html));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
    }
}
