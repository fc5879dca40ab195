use super::{decode, CssRewriter, LinkRewriter, RewriteContext, Rewritten};
use crate::{MirrorError, Result};
use encoding_rs::{Encoding, UTF_8};
use lol_html::html_content::{ContentType, Element};
use lol_html::{element, rewrite_str, text, HandlerResult, RewriteStrSettings};
use regex::Regex;
use std::cell::RefCell;

/// Bytes inspected for a `<meta>` charset declaration
const SNIFF_LIMIT: usize = 1024;

/// `<meta charset=...>` or the charset parameter of an http-equiv content type
const META_CHARSET: &str = r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_:.\-]+)"#;

/// Selector and attribute pairs whose value is a single URL reference
const LINK_ATTRIBUTES: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("link[href]", "href"),
    ("script[src]", "src"),
    ("img[src]", "src"),
    ("iframe[src]", "src"),
    ("source[src]", "src"),
];

/// Rewrites references in HTML documents
///
/// Handles the link attributes above, inline `style` attributes and
/// `<style>` elements. The document is streamed through `lol_html`, so
/// everything that is not a rewritten attribute or style text is emitted
/// as it was received.
#[derive(Debug, Clone)]
pub struct HtmlRewriter {
    meta_charset: Regex,
    css: CssRewriter,
}

impl HtmlRewriter {
    pub fn new(css: CssRewriter) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            meta_charset: Regex::new(META_CHARSET)?,
            css,
        })
    }

    /// Picks the encoding of an HTML document
    ///
    /// Byte order mark, then the charset declared by the server, then a
    /// `<meta>` declaration near the start of the document, then UTF-8.
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
        self.meta_charset
            .captures(&head)
            .and_then(|caps| caps.get(1))
            .and_then(|label| Encoding::for_label(label.as_str().as_bytes()))
            .map(|encoding| encoding.output_encoding())
            .unwrap_or(UTF_8)
    }

    /// Rewrites a fetched HTML document
    ///
    /// # Arguments
    ///
    /// * `body` - Raw response body
    /// * `declared` - Charset from the Content-Type header, if any
    /// * `ctx` - Where the document lives on the site and in the mirror
    ///
    /// # Returns
    ///
    /// The UTF-8 document text and the in-scope URLs it references. When the
    /// document was transcoded, its `<meta>` charset declarations are
    /// changed to UTF-8.
    pub fn rewrite(
        &self,
        body: &[u8],
        declared: Option<&'static Encoding>,
        ctx: RewriteContext<'_>,
    ) -> Result<Rewritten> {
        let encoding = self.detect_encoding(body, declared);
        let html = decode(body, encoding, ctx.base);

        let linker = RefCell::new(LinkRewriter::new(ctx));
        let style_text = RefCell::new(String::new());
        let css = &self.css;

        let mut handlers = Vec::new();

        for &(selector, attribute) in LINK_ATTRIBUTES {
            let linker = &linker;
            handlers.push(element!(selector, move |el| {
                rewrite_attribute(el, attribute, linker)
            }));
        }

        handlers.push(element!("*[style]", |el| {
            rewrite_style_attribute(el, css, &linker)
        }));

        // Style text may arrive in several chunks; rewrite it once complete
        handlers.push(text!("style", |chunk| {
            let mut buffer = style_text.borrow_mut();
            buffer.push_str(chunk.as_str());
            if chunk.last_in_text_node() {
                let rewritten = css.rewrite_with(&buffer, &mut linker.borrow_mut());
                chunk.replace(&rewritten, ContentType::Html);
                buffer.clear();
            } else {
                chunk.remove();
            }
            Ok(())
        }));

        if encoding != UTF_8 {
            handlers.push(element!("meta[charset]", |el| {
                el.set_attribute("charset", "utf-8")?;
                Ok(())
            }));
            handlers.push(element!("meta[http-equiv]", |el| {
                let content_type = el
                    .get_attribute("http-equiv")
                    .map(|value| value.trim().eq_ignore_ascii_case("content-type"))
                    .unwrap_or(false);
                if content_type && el.has_attribute("content") {
                    el.set_attribute("content", "text/html; charset=utf-8")?;
                }
                Ok(())
            }));
        }

        let text = rewrite_str(
            &html,
            RewriteStrSettings {
                element_content_handlers: handlers,
                ..RewriteStrSettings::default()
            },
        )
        .map_err(|e| MirrorError::HtmlRewrite {
            url: ctx.base.to_string(),
            message: e.to_string(),
        })?;

        Ok(Rewritten {
            text,
            links: linker.into_inner().into_links(),
        })
    }
}

fn rewrite_attribute(
    el: &mut Element<'_, '_>,
    attribute: &str,
    linker: &RefCell<LinkRewriter<'_>>,
) -> HandlerResult {
    if let Some(raw) = el.get_attribute(attribute) {
        let reference = html_escape::decode_html_entities(&raw);
        if let Some(link) = linker.borrow_mut().rewrite_reference(&reference) {
            el.set_attribute(attribute, &link)?;
        }
    }
    Ok(())
}

fn rewrite_style_attribute(
    el: &mut Element<'_, '_>,
    css: &CssRewriter,
    linker: &RefCell<LinkRewriter<'_>>,
) -> HandlerResult {
    if let Some(raw) = el.get_attribute("style") {
        let style = html_escape::decode_html_entities(&raw);
        let rewritten = css.rewrite_with(&style, &mut linker.borrow_mut());
        if rewritten != style {
            el.set_attribute("style", &rewritten)?;
        }
    }
    Ok(())
}
