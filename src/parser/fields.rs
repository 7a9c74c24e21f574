use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::text::{clean, strip_tags};
use crate::config::SITE_ORIGIN;

/// Written when the page has no rating summary at all ("no ratings yet").
pub const RATING_NOT_AVAILABLE: &str = "NA";
/// Written when the fetch layer did not report a final URL.
pub const PRODUCT_LINK_MISSING: &str = "None";
pub const MISSING_COUNT: u32 = 0;
/// Raw default for an absent star bar; normalized like a real title.
pub const MISSING_PERCENTAGE: &str = "0%";

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]+,[0-9]+").unwrap());
static VENDOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:Marke:|Besuche den)\s(\w.*)").unwrap());
static RATING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d,\d").unwrap());
static PERCENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+%").unwrap());

/// Check-then-extract-else-default.
///
/// No fragments: `default`, without running `extract`. Otherwise the first
/// fragment for which `extract` yields a value wins (take-first); later
/// fragments are ignored. Fragments that are present but never yield a value
/// also fall back to `default` so a single bad field never sinks the record.
pub fn resolve<T>(
    field: &str,
    fragments: &[String],
    default: T,
    extract: impl Fn(&str) -> Option<T>,
) -> T {
    if fragments.is_empty() {
        return default;
    }
    match fragments.iter().find_map(|f| extract(f)) {
        Some(value) => value,
        None => {
            debug!(field, count = fragments.len(), "fragments present but unparseable");
            default
        }
    }
}

/// Markup-stripped, trimmed text. Empty results do not count as a match.
pub fn text(field: &str, fragments: &[String]) -> String {
    resolve(field, fragments, String::new(), |f| {
        Some(clean(f)).filter(|s| !s.is_empty())
    })
}

/// Attribute or header values: already decoded, so only trimmed.
pub fn trimmed(field: &str, fragments: &[String]) -> String {
    resolve(field, fragments, String::new(), |f| {
        Some(f.trim().to_string()).filter(|s| !s.is_empty())
    })
}

/// Prefer the subscribe & save base price when the page shows one.
pub fn price_fragments<'a>(base_price: &'a [String], offscreen: &'a [String]) -> &'a [String] {
    if base_price.is_empty() {
        offscreen
    } else {
        base_price
    }
}

pub fn price(fragments: &[String]) -> Option<f64> {
    resolve("price", fragments, None, |f| parse_price(f).map(Some))
}

/// `"12,34 €"` → `12.34`. Only the comma-decimal format is recognized.
pub fn parse_price(fragment: &str) -> Option<f64> {
    let text = clean(fragment);
    let m = PRICE_RE.find(&text)?;
    m.as_str().replace(',', ".").parse().ok()
}

pub fn vendor_name(fragments: &[String]) -> String {
    resolve("vendor_name", fragments, String::new(), |f| {
        let text = strip_tags(f);
        VENDOR_RE
            .captures(&text)
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

pub fn vendor_link(fragments: &[String]) -> String {
    resolve("vendor_link", fragments, String::new(), |href| {
        let href = href.trim();
        (!href.is_empty()).then(|| absolute_url(href))
    })
}

/// Prefix a site-relative path with the origin. The path is not validated.
pub fn absolute_url(path: &str) -> String {
    format!("{SITE_ORIGIN}{path}")
}

pub fn overall_rating(fragments: &[String]) -> String {
    resolve(
        "overall_reviews_out_of_5",
        fragments,
        RATING_NOT_AVAILABLE.to_string(),
        |f| {
            RATING_RE
                .find(&strip_tags(f))
                .map(|m| m.as_str().replace(',', "."))
        },
    )
}

/// Digits of the first fragment that has any, concatenated: grouping marks
/// such as `"1.234"` collapse into `1234`.
pub fn review_count(fragments: &[String]) -> u32 {
    resolve("num_reviews", fragments, MISSING_COUNT, |f| {
        let digits: String = strip_tags(f).chars().filter(char::is_ascii_digit).collect();
        digits.parse().ok()
    })
}

pub fn star_percentage(stars: u8, fragments: &[String]) -> u32 {
    let field = format!("pct_{stars}_star_reviews");
    let token = resolve(&field, fragments, MISSING_PERCENTAGE.to_string(), |title| {
        PERCENT_RE.find(title).map(|m| m.as_str().to_string())
    });
    token.replace('%', "").parse().unwrap_or(MISSING_COUNT)
}

pub fn product_link(final_url: Option<&String>) -> String {
    let fragments: Vec<String> = final_url.cloned().into_iter().collect();
    resolve("product_link", &fragments, PRODUCT_LINK_MISSING.to_string(), |url| {
        Some(url.trim().to_string()).filter(|s| !s.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolve_skips_extraction_when_absent() {
        let called = std::cell::Cell::new(false);
        let v = resolve("x", &[], 7u32, |_| {
            called.set(true);
            Some(1)
        });
        assert_eq!(v, 7);
        assert!(!called.get());
    }

    #[test]
    fn resolve_takes_first_match() {
        let v = resolve("x", &frags(&["a", "12", "34"]), 0u32, |f| f.parse().ok());
        assert_eq!(v, 12);
    }

    #[test]
    fn price_comma_decimal() {
        assert_eq!(price(&frags(&["12,34 €"])), Some(12.34));
        assert_eq!(
            price(&frags(&[r#"<span class="a-offscreen">49,90&nbsp;€</span>"#])),
            Some(49.9)
        );
    }

    #[test]
    fn price_unparseable_or_absent_is_null() {
        assert_eq!(price(&frags(&["Derzeit nicht verfügbar"])), None);
        assert_eq!(price(&[]), None);
    }

    #[test]
    fn base_price_wins_when_present() {
        let base = frags(&["<span id=\"sns-base-price\">39,99 €</span>"]);
        let offscreen = frags(&["44,50 €"]);
        assert_eq!(price(price_fragments(&base, &offscreen)), Some(39.99));
        assert_eq!(price(price_fragments(&[], &offscreen)), Some(44.50));
    }

    #[test]
    fn vendor_name_after_either_label() {
        assert_eq!(
            vendor_name(&frags(&[r#"<a id="bylineInfo" href="/x">Marke: Kopi Bali</a>"#])),
            "Kopi Bali"
        );
        assert_eq!(
            vendor_name(&frags(&["<a>Besuche den Luwak-Store</a>"])),
            "Luwak-Store"
        );
        assert_eq!(vendor_name(&frags(&["<a>Kopi Bali</a>"])), "");
        assert_eq!(vendor_name(&[]), "");
    }

    #[test]
    fn vendor_link_is_absolute() {
        assert_eq!(
            vendor_link(&frags(&["/stores/page/XYZ"])),
            "https://www.amazon.de/stores/page/XYZ"
        );
        assert_eq!(vendor_link(&[]), "");
    }

    #[test]
    fn rating_sentinel_and_dot_decimal() {
        assert_eq!(overall_rating(&[]), RATING_NOT_AVAILABLE);
        assert_eq!(overall_rating(&frags(&["4,5 von 5 Sternen"])), "4.5");
        assert_eq!(
            overall_rating(&frags(&["Previous page", "3,9 von 5 Sternen"])),
            "3.9"
        );
    }

    #[test]
    fn review_count_digits() {
        assert_eq!(review_count(&[]), 0);
        assert_eq!(review_count(&frags(&["20 Sternebewertungen"])), 20);
        assert_eq!(
            review_count(&frags(&["<span>1.234 Sternebewertungen</span>"])),
            1234
        );
    }

    #[test]
    fn star_percentages() {
        assert_eq!(star_percentage(5, &[]), 0);
        assert_eq!(
            star_percentage(5, &frags(&["32% der Rezensionen haben 5 Sterne"])),
            32
        );
        assert_eq!(star_percentage(2, &frags(&["keine Angabe"])), 0);
    }

    #[test]
    fn product_link_sentinel() {
        assert_eq!(product_link(None), PRODUCT_LINK_MISSING);
        let url = "https://www.amazon.de/dp/B000TEST".to_string();
        assert_eq!(product_link(Some(&url)), url);
    }

    #[test]
    fn urls_are_not_decoded_twice() {
        let url = " https://www.amazon.de/dp/B0?a=1&amp;b=2 ".to_string();
        assert_eq!(product_link(Some(&url)), "https://www.amazon.de/dp/B0?a=1&amp;b=2");
        assert_eq!(
            trimmed("main_image_link", &frags(&["https://m.media-amazon.com/I/x.jpg?q=1&amp;w=2"])),
            "https://m.media-amazon.com/I/x.jpg?q=1&amp;w=2"
        );
        assert_eq!(trimmed("main_image_link", &frags(&["  "])), "");
    }

    #[test]
    fn thousands_separator_keeps_trailing_group() {
        // Only `digits,digits` is matched, so the leading group is lost.
        assert_eq!(price(&frags(&["1.299,00 €"])), Some(299.0));
    }

    #[test]
    fn text_skips_empty_fragments() {
        assert_eq!(text("product_name", &frags(&["<span> </span>", "<span>Kopi</span>"])), "Kopi");
        assert_eq!(text("product_name", &[]), "");
    }
}
