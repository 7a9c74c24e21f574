pub mod fields;
pub mod select;
pub mod text;

use chrono::NaiveDateTime;
use scraper::Html;
use thiserror::Error;
use tracing::debug;

use crate::feed::{FetchedPage, ProductRecord};
use select::ProductFragments;

/// Why a detail page produced no record. Field-level problems never end up
/// here; they resolve to their defaults instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no product container (#ppd or #ppdHandmade)")]
    NoProductContainer,
    #[error("product title is missing or empty")]
    MissingProductName,
}

/// Two-step pipeline: HTML → fragments → record.
pub fn process_page(
    page: &FetchedPage,
    captured_at: NaiveDateTime,
) -> Result<ProductRecord, ExtractError> {
    let doc = Html::parse_document(&page.html);
    let fragments = select::select_fragments(&doc, page.final_url.clone())
        .ok_or(ExtractError::NoProductContainer)?;
    debug!("Extracting {} ({:?} layout)", page.url, fragments.layout);
    build_record(&fragments, captured_at)
}

/// Resolve every field of a record from its fragments.
pub fn build_record(
    f: &ProductFragments,
    captured_at: NaiveDateTime,
) -> Result<ProductRecord, ExtractError> {
    let product_name = fields::text("product_name", &f.product_name);
    if product_name.is_empty() {
        return Err(ExtractError::MissingProductName);
    }

    let [one, two, three, four, five] = &f.star_titles;

    Ok(ProductRecord {
        product_name,
        main_image_link: fields::trimmed("main_image_link", &f.main_image_link),
        price: fields::price(fields::price_fragments(&f.base_price, &f.offscreen_price)),
        vendor_name: fields::vendor_name(&f.byline),
        vendor_link: fields::vendor_link(&f.byline_href),
        overall_reviews_out_of_5: fields::overall_rating(&f.rating_summary),
        num_reviews: fields::review_count(&f.review_count),
        pct_5_star_reviews: fields::star_percentage(5, five),
        pct_4_star_reviews: fields::star_percentage(4, four),
        pct_3_star_reviews: fields::star_percentage(3, three),
        pct_2_star_reviews: fields::star_percentage(2, two),
        pct_1_star_reviews: fields::star_percentage(1, one),
        product_link: fields::product_link(f.final_url.as_ref()),
        extraction_timestamp: captured_at,
    })
}

// ── Tests ──
