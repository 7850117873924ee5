use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::base::{self, FieldChain, Strategy};

static SECTION_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["div.day-section", "section.event-day", "div.archive-day"]
        .iter()
        .map(|css| Selector::parse(css).expect("listing section selector"))
        .collect()
});
static ITEM_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["div.event-item", "article.event", "li.event"]
        .iter()
        .map(|css| Selector::parse(css).expect("listing item selector"))
        .collect()
});
static DAY_HEADING: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::attr("[data-date]", "data-date"),
        Strategy::text(".day-title"),
        Strategy::text("h2"),
        Strategy::text("h3.date"),
    ])
});
static ITEM_LINK: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::attr("a.event-link", "href"),
        Strategy::attr(".title a", "href"),
        Strategy::attr("h3 a", "href"),
        Strategy::attr("a[href]", "href"),
    ])
});
static ITEM_TITLE: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::text("a.event-link"),
        Strategy::text(".title"),
        Strategy::text("h3"),
    ])
});
static ITEM_TIME: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::text(".event-time"),
        Strategy::text(".time"),
        Strategy::text("time"),
    ])
});
static ITEM_PRICE: Lazy<FieldChain> = Lazy::new(|| {
    FieldChain::new(vec![
        Strategy::text(".event-price"),
        Strategy::text(".cost"),
        Strategy::text(".price"),
    ])
});

/// One candidate from the listing page, before its detail page is visited.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    pub link: String,
    pub title: Option<String>,
    pub date_text: String,
    pub time_text: Option<String>,
    pub price_text: Option<String>,
    pub featured: bool,
}

fn first_productive<'a>(root: ElementRef<'a>, selectors: &[Selector]) -> Vec<ElementRef<'a>> {
    selectors
        .iter()
        .map(|selector| root.select(selector).collect::<Vec<_>>())
        .find(|nodes| !nodes.is_empty())
        .unwrap_or_default()
}

fn is_featured(node: &ElementRef<'_>) -> bool {
    node.value()
        .classes()
        .any(|class| class == "featured" || class == "top-pick")
}

/// Walks day sections in page order and collects their items. Items without
/// a usable link are dropped.
pub fn parse_listing(html: &str, base_url: &str) -> Vec<ListingItem> {
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for section in first_productive(document.root_element(), &SECTION_SELECTORS) {
        let Some(date_text) = DAY_HEADING.first(&section) else {
            warn!("listing day section without a date heading");
            continue;
        };

        for node in first_productive(section, &ITEM_SELECTORS) {
            let Some(link) = base::absolute_url(base_url, ITEM_LINK.first(&node)) else {
                debug!(date = %date_text, "listing item without a link");
                continue;
            };
            items.push(ListingItem {
                link,
                title: ITEM_TITLE.first(&node),
                date_text: date_text.clone(),
                time_text: ITEM_TIME.first(&node),
                price_text: ITEM_PRICE.first(&node),
                featured: is_featured(&node),
            });
        }
    }

    items
}
