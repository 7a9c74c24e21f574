use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static STANDARD_ROOT: LazyLock<Selector> = LazyLock::new(|| selector("div#ppd"));
static HANDMADE_ROOT: LazyLock<Selector> = LazyLock::new(|| selector("div#ppdHandmade"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("span#productTitle"));
static MAIN_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("span.a-button-text img"));
static BASE_PRICE: LazyLock<Selector> = LazyLock::new(|| selector("span#sns-base-price"));
static OFFSCREEN_PRICE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"span[class="a-offscreen"]"#));
static BYLINE: LazyLock<Selector> = LazyLock::new(|| selector("a#bylineInfo"));
static RATING_SUMMARY: LazyLock<Selector> = LazyLock::new(|| selector("span.a-icon-alt"));
static REVIEW_COUNT: LazyLock<Selector> =
    LazyLock::new(|| selector("span#acrCustomerReviewText"));
static STAR_BARS: LazyLock<[Selector; 5]> = LazyLock::new(|| {
    std::array::from_fn(|i| {
        selector(&format!(r#"a[title*="der Rezensionen haben {} Sterne"]"#, i + 1))
    })
});

/// Which product container the page uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Standard,
    Handmade,
}

/// Raw fragments for each field, in document order. An empty list means the
/// element was not on the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFragments {
    pub layout: Layout,
    pub product_name: Vec<String>,
    pub main_image_link: Vec<String>,
    pub base_price: Vec<String>,
    pub offscreen_price: Vec<String>,
    pub byline: Vec<String>,
    pub byline_href: Vec<String>,
    pub rating_summary: Vec<String>,
    pub review_count: Vec<String>,
    /// Index 0 holds the 1-star bar titles, index 4 the 5-star ones.
    pub star_titles: [Vec<String>; 5],
    pub final_url: Option<String>,
}

/// Pick the product container (`#ppd`, else `#ppdHandmade`).
pub fn product_root(doc: &Html) -> Option<(Layout, ElementRef<'_>)> {
    doc.select(&STANDARD_ROOT)
        .next()
        .map(|el| (Layout::Standard, el))
        .or_else(|| {
            doc.select(&HANDMADE_ROOT)
                .next()
                .map(|el| (Layout::Handmade, el))
        })
}

/// Collect every field's fragments. `None` when neither container exists.
pub fn select_fragments(doc: &Html, final_url: Option<String>) -> Option<ProductFragments> {
    let (layout, root) = product_root(doc)?;

    Some(ProductFragments {
        layout,
        product_name: outer_html(root, &TITLE),
        main_image_link: attr(root, &MAIN_IMAGE, "src"),
        base_price: with_text(root, &BASE_PRICE),
        offscreen_price: outer_html(root, &OFFSCREEN_PRICE),
        byline: outer_html(root, &BYLINE),
        byline_href: attr(root, &BYLINE, "href"),
        rating_summary: with_text(root, &RATING_SUMMARY),
        review_count: with_text(root, &REVIEW_COUNT),
        // Histogram links sit outside the product container on real pages.
        star_titles: std::array::from_fn(|i| {
            doc.select(&STAR_BARS[i])
                .filter_map(|el| el.value().attr("title"))
                .map(str::to_string)
                .collect()
        }),
        final_url,
    })
}

fn outer_html(root: ElementRef<'_>, sel: &Selector) -> Vec<String> {
    root.select(sel).map(|el| el.html()).collect()
}

/// Like `outer_html`, but only elements that carry text count as present.
fn with_text(root: ElementRef<'_>, sel: &Selector) -> Vec<String> {
    root.select(sel)
        .filter(|el| el.text().any(|t| !t.is_empty()))
        .map(|el| el.html())
        .collect()
}

fn attr(root: ElementRef<'_>, sel: &Selector, name: &str) -> Vec<String> {
    root.select(sel)
        .filter_map(|el| el.value().attr(name))
        .map(str::to_string)
        .collect()
}
