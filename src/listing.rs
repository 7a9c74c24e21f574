use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::warn;

use crate::parser::fields::absolute_url;

static SEARCH_RESULT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[data-component-type="s-search-result"]"#).unwrap());
static RESULT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.a-link-normal.s-no-outline").unwrap());
static NEXT_PAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[class*="s-pagination-next"]"#).unwrap());

/// One page of category search results.
#[derive(Debug, Default, PartialEq)]
pub struct ListingPage {
    pub product_urls: Vec<String>,
    pub next_page: Option<String>,
}

/// Product detail URLs in result order, plus the absolute next-page URL.
pub fn parse_listing(html: &str) -> ListingPage {
    let doc = Html::parse_document(html);

    let mut product_urls = Vec::new();
    for (i, result) in doc.select(&SEARCH_RESULT).enumerate() {
        let href = result
            .select(&RESULT_LINK)
            .find_map(|a| a.value().attr("href"));
        match href {
            Some(href) => product_urls.push(absolute_url(href)),
            None => warn!(
                "Search result #{} ({}) has no product link, skipping",
                i + 1,
                result.value().attr("data-asin").unwrap_or("?")
            ),
        }
    }

    let next_page = doc
        .select(&NEXT_PAGE)
        .find_map(|a| a.value().attr("href"))
        .map(absolute_url);

    ListingPage {
        product_urls,
        next_page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(fixture: &str) -> ListingPage {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        parse_listing(&html)
    }

    #[test]
    fn results_and_next_page() {
        let page = parse("search_page");
        assert_eq!(
            page.product_urls,
            vec![
                "https://www.amazon.de/Kopi-Luwak-Kaffee-Bali/dp/B08LUWAK01/ref=sr_1_1",
                "https://www.amazon.de/Luwak-Kaffee-gemahlen/dp/B09LUWAK02/ref=sr_1_2",
            ]
        );
        assert_eq!(
            page.next_page.as_deref(),
            Some("https://www.amazon.de/s?k=luwak+kaffee&page=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let page = parse("search_last_page");
        assert_eq!(page.product_urls.len(), 1);
        assert!(page.next_page.is_none());
    }
}
