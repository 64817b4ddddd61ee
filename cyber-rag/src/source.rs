//! Document acquisition: turning a URL into plain text.

use async_trait::async_trait;

/// Fetches the textual content of a document.
///
/// `None` means extraction failed and there is nothing to index.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Return the plain-text content behind `url`, or `None` on failure.
    async fn textual_content(&self, url: &str) -> Option<String>;
}

#[cfg(feature = "fetch")]
pub use http::{HttpDocumentSource, html_to_text};

#[cfg(feature = "fetch")]
mod http {
    use std::io::Cursor;
    use std::sync::LazyLock;
    use std::time::Duration;

    use async_trait::async_trait;
    use regex::Regex;
    use reqwest::Url;
    use tracing::{info, warn};

    use super::DocumentSource;

    const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

    static FIRST_H1: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1\s*>").unwrap());
    static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|blockquote|pre|section|article|ul|ol|table)\s*>",
        )
        .unwrap()
    });
    static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

    /// Markup to plain text, one paragraph per block element.
    fn markup_text(markup: &str) -> String {
        let broken = BLOCK_END.replace_all(markup, "\n\n");
        let stripped = TAG.replace_all(&broken, "");
        let decoded = html_escape::decode_html_entities(&stripped);

        let mut lines: Vec<String> = Vec::new();
        for line in decoded.lines() {
            let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
            if !line.is_empty() || lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(line);
            }
        }
        lines.join("\n").trim().to_string()
    }

    /// Reduce an HTML page to its article text.
    ///
    /// The main content block is chosen by readability scoring, which drops
    /// navigation, scripts and other page furniture. The page's first `<h1>`
    /// (or its `<title>`) heads the text when the content block does not
    /// already start with it. Returns an empty string when nothing readable
    /// remains.
    pub fn html_to_text(html: &str, url: &Url) -> String {
        let product = match readability::extractor::extract(&mut Cursor::new(html.as_bytes()), url)
        {
            Ok(product) => product,
            Err(e) => {
                warn!(%url, error = %e, "article extraction failed");
                return String::new();
            }
        };

        let body = markup_text(&product.content);
        let heading = FIRST_H1
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| markup_text(m.as_str()))
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| markup_text(&product.title));

        if heading.is_empty() || body.lines().next() == Some(heading.as_str()) {
            body
        } else if body.is_empty() {
            heading
        } else {
            format!("{heading}\n\n{body}")
        }
    }

    /// Fetches a web page over HTTP and extracts its article text.
    #[derive(Debug, Clone)]
    pub struct HttpDocumentSource {
        client: Option<reqwest::Client>,
    }

    impl Default for HttpDocumentSource {
        fn default() -> Self {
            Self::new(Duration::from_secs(60))
        }
    }

    impl HttpDocumentSource {
        /// Create a source whose requests give up after `timeout`.
        pub fn new(timeout: Duration) -> Self {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()
                .map_err(|e| warn!(error = %e, "failed to build HTTP client"))
                .ok();
            Self { client }
        }

        /// Fetch the page, returning its body and the URL after redirects.
        async fn fetch(&self, url: &str) -> Result<(String, Url), String> {
            let client = self.client.as_ref().ok_or("HTTP client unavailable")?;
            let url = Url::parse(url).map_err(|e| format!("invalid URL: {e}"))?;
            let response = client.get(url).send().await.map_err(|e| e.to_string())?;
            let response = response.error_for_status().map_err(|e| e.to_string())?;
            let final_url = response.url().clone();
            let body = response.text().await.map_err(|e| e.to_string())?;
            Ok((body, final_url))
        }
    }

    #[async_trait]
    impl DocumentSource for HttpDocumentSource {
        async fn textual_content(&self, url: &str) -> Option<String> {
            info!(url, "fetching document");
            match self.fetch(url).await {
                Ok((html, final_url)) => {
                    let text = html_to_text(&html, &final_url);
                    if text.is_empty() {
                        warn!(url, "page contained no extractable text");
                        None
                    } else {
                        info!(url, chars = text.len(), "extracted document text");
                        Some(text)
                    }
                }
                Err(error) => {
                    warn!(url, %error, "failed to fetch document");
                    None
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn base() -> Url {
            Url::parse("https://blog.example/posts/lumma").unwrap()
        }

        #[test]
        fn title_in_article_header_is_kept() {
            let html = "<html><body><article><header><h1>Lumma Stealer returns</h1></header>\
                <p>The actor&#8217;s loader drops a DLL into the user profile directory.</p>\
                <p>It then beacons to a command and control server every five minutes.</p>\
                </article></body></html>";
            let text = html_to_text(html, &base());

            assert!(text.starts_with("Lumma Stealer returns\n\n"), "{text}");
            assert!(text.contains("The actor\u{2019}s loader drops a DLL"), "{text}");
            assert!(!text.contains("&#8217;"));
            assert_eq!(text.matches("Lumma Stealer returns").count(), 1);
        }

        #[test]
        fn page_furniture_is_dropped() {
            let html = r#"<html><head><title>Blog</title><style>body{}</style>
<script>var tracking = 1;</script></head>
<body><nav>Home | Blog | Careers</nav>
<article><h1>Malware X</h1>
<p>Malware X steals browser <b>cookies</b> &amp; saved credentials from infected hosts.</p>
<p>The stolen data is sent to a remote server over HTTPS, then deleted locally.</p></article>
</body></html>"#;
            let text = html_to_text(html, &base());

            assert!(text.starts_with("Malware X\n\n"), "{text}");
            assert!(text.contains("steals browser cookies & saved credentials"), "{text}");
            assert!(text.contains("remote server over HTTPS"), "{text}");
            assert!(!text.contains("tracking"));
            assert!(!text.contains("Careers"));
        }

        #[test]
        fn empty_page_yields_empty_text() {
            assert_eq!(html_to_text("<html><script>x</script></html>", &base()), "");
        }

        #[test]
        fn markup_text_collapses_blank_runs() {
            assert_eq!(markup_text("<p>a  b</p>\n\n\n<p>c&nbsp;d</p>"), "a b\n\nc d");
        }
    }
}
