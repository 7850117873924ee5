use once_cell::sync::Lazy;
use scraper::Html;

use super::base::{self, FieldChain, Strategy};

pub const MAX_CATEGORIES: usize = 3;

static NAME: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::text("h1.entry-title"),
        Strategy::text("h1.event-title"),
        Strategy::attr("meta[property='og:title']", "content"),
        Strategy::text("title"),
    ])
});
static LOCATION: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::text(".venue-name"),
        Strategy::text(".event-location"),
        Strategy::text("[itemprop='location'] [itemprop='name']"),
        Strategy::text(".location"),
    ])
});
static GMAPS: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::attr("a[href*='google.com/maps']", "href"),
        Strategy::attr("a[href*='maps.google']", "href"),
        Strategy::attr("a[href*='goo.gl/maps']", "href"),
    ])
});
static DESCRIPTION: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::text(".event-description"),
        Strategy::text(".entry-content p"),
        Strategy::attr("meta[property='og:description']", "content"),
        Strategy::attr("meta[name='description']", "content"),
    ])
});
static CATEGORIES: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::text(".category a"),
        Strategy::text("a[rel~='tag']"),
        Strategy::text(".event-tags a"),
    ])
});
static IMAGE: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::attr("meta[property='og:image']", "content"),
        Strategy::attr("img.wp-post-image", "src"),
        Strategy::attr(".entry-content img", "src"),
    ])
});
static PRICE: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::text(".cost"),
        Strategy::text(".event-price"),
        Strategy::text(".price"),
    ])
});
static TIME: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![Strategy::text(".event-time"), Strategy::text(".time-range")])
});

/// Fields lifted from an event's own page. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub name: Option<String>,
    pub location: Option<String>,
    pub gmaps: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub image: Option<String>,
    pub price_text: Option<String>,
    pub time_text: Option<String>,
}

pub fn parse_detail(html: &str, page_url: &str) -> DetailFields {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let mut categories: Vec<String> = Vec::new();
    for category in CATEGORIES.all(&root) {
        if categories.len() == MAX_CATEGORIES {
            break;
        }
        if !categories
            .iter()
            .any(|seen| seen.eq_ignore_ascii_case(&category))
        {
            categories.push(category);
        }
    }

    DetailFields {
        name: NAME.first(&root),
        location: LOCATION.first(&root),
        gmaps: GMAPS.first(&root),
        description: DESCRIPTION.first(&root),
        categories,
        image: base::absolute_url(page_url, IMAGE.first(&root)),
        price_text: PRICE.first(&root),
        time_text: TIME.first(&root),
    }
}
