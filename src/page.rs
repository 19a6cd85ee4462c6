use reqwest::Url;
use scraper::{Html, Selector};

use crate::domain::CoverPage;

pub trait PageResolver: Send + Sync {
    fn resolve(&self, page: &[u8], page_url: &str) -> Option<CoverPage>;
}

const ARTWORK_SELECTOR: &str = "a.bigImage";
const TITLE_SELECTOR: &str = "div.container h3";

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlPageResolver;

impl HtmlPageResolver {
    pub fn new() -> Self {
        Self
    }
}

fn artwork_src(document: &Html) -> Option<String> {
    let anchor_selector = Selector::parse(ARTWORK_SELECTOR).ok()?;
    let img_selector = Selector::parse("img").ok()?;
    let anchor = document.select(&anchor_selector).next()?;
    anchor
        .select(&img_selector)
        .next()
        .and_then(|img| img.value().attr("src"))
        .or_else(|| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

fn title_text(document: &Html) -> Option<String> {
    let selector = Selector::parse(TITLE_SELECTOR).ok()?;
    let raw = document.select(&selector).next()?.text().collect::<String>();
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

impl PageResolver for HtmlPageResolver {
    fn resolve(&self, page: &[u8], page_url: &str) -> Option<CoverPage> {
        let html = String::from_utf8_lossy(page);
        let document = Html::parse_document(&html);

        let src = artwork_src(&document)?;
        let title = title_text(&document)?;
        let artwork_url = absolute_url(page_url, &src)?;

        Some(CoverPage { artwork_url, title })
    }
}

fn absolute_url(page_url: &str, src: &str) -> Option<String> {
    if let Ok(url) = Url::parse(src) {
        return Some(url.to_string());
    }
    Url::parse(page_url)
        .ok()?
        .join(src)
        .ok()
        .map(|url| url.to_string())
}
