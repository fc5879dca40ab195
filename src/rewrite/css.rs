use super::{decode, LinkRewriter, RewriteContext, Rewritten};
use encoding_rs::{Encoding, UTF_8};
use regex::{Captures, Regex};

/// `url(...)` with single, double or no quotes; case-insensitive keyword
const URL_FUNCTION: &str =
    r#"(?i)\burl\s*\(\s*(?:'([^']*)'|"([^"]*)"|([^'"\)\s][^'"\)]*?))\s*\)"#;

/// `@import "..."` in string form (the `url()` form is covered above)
const IMPORT_STRING: &str = r#"(?i)@import\s+(?:'([^']*)'|"([^"]*)")"#;

/// Leading `@charset` rule
const CHARSET_RULE: &str = r#"^@charset\s+"([^"]+)"\s*;"#;

/// Bytes inspected for a `@charset` rule
const SNIFF_LIMIT: usize = 1024;

/// Rewrites references in stylesheets and inline style declarations
#[derive(Debug, Clone)]
pub struct CssRewriter {
    url_function: Regex,
    import_string: Regex,
    charset_rule: Regex,
}

impl CssRewriter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            url_function: Regex::new(URL_FUNCTION)?,
            import_string: Regex::new(IMPORT_STRING)?,
            charset_rule: Regex::new(CHARSET_RULE)?,
        })
    }

    /// Picks the encoding of a stylesheet
    ///
    /// Byte order mark, then the charset declared by the server, then a
    /// leading `@charset` rule, then UTF-8.
    pub fn detect_encoding(
        &self,
        body: &[u8],
        declared: Option<&'static Encoding>,
    ) -> &'static Encoding {
        if let Some((encoding, _)) = Encoding::for_bom(body) {
            return encoding;
        }
        if let Some(encoding) = declared {
            return encoding;
        }

        let head = String::from_utf8_lossy(&body[..body.len().min(SNIFF_LIMIT)]);
        self.charset_rule
            .captures(&head)
            .and_then(|caps| caps.get(1))
            .and_then(|label| Encoding::for_label(label.as_str().as_bytes()))
            .map(|encoding| encoding.output_encoding())
            .unwrap_or(UTF_8)
    }

    /// Rewrites a fetched stylesheet
    ///
    /// The result is UTF-8; a leading `@charset` naming another encoding is
    /// changed to match.
    pub fn rewrite(
        &self,
        body: &[u8],
        declared: Option<&'static Encoding>,
        ctx: RewriteContext<'_>,
    ) -> Rewritten {
        let encoding = self.detect_encoding(body, declared);
        let css = decode(body, encoding, ctx.base);

        let mut linker = LinkRewriter::new(ctx);
        let mut text = self.rewrite_with(&css, &mut linker);

        if encoding != UTF_8 {
            text = self
                .charset_rule
                .replace(&text, r#"@charset "UTF-8";"#)
                .into_owned();
        }

        Rewritten {
            text,
            links: linker.into_links(),
        }
    }

    /// Rewrites every in-scope `url(...)` and `@import "..."` in `css`
    ///
    /// In-scope references are normalized to `url('relative-path')` and
    /// `@import 'relative-path'`; everything else is left verbatim.
    pub fn rewrite_with(&self, css: &str, linker: &mut LinkRewriter<'_>) -> String {
        let css = self.url_function.replace_all(css, |caps: &Captures| {
            match linker.rewrite_reference(captured_reference(caps)) {
                Some(link) => format!("url('{}')", link),
                None => caps[0].to_string(),
            }
        });

        self.import_string
            .replace_all(&css, |caps: &Captures| {
                match linker.rewrite_reference(captured_reference(caps)) {
                    Some(link) => format!("@import '{}'", link),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn captured_reference<'t>(caps: &Captures<'t>) -> &'t str {
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| m.as_str())
        .unwrap_or_default()
}
