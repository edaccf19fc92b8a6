use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::WishlistError;
use crate::models::Item;

/// Phrase on the interstitial Amazon serves instead of the wishlist when it
/// suspects automated access.
pub const ROBOT_MESSAGE: &str = "we just need to make sure you're not a robot";

const ITEM_ID_ATTR: &str = "data-itemid";
const DATE_ADDED_MARKER: &str = "Added ";

pub fn is_robot_check(body: &str) -> bool {
    body.contains(ROBOT_MESSAGE)
}

/// Compiled selectors for the wishlist markup.
#[derive(Debug)]
pub struct PageSelectors {
    list_item: Selector,
    title_link: Selector,
    price: Selector,
    price_text: Selector,
    date_added: Selector,
    date_added_text: Selector,
    rating: Selector,
    review_count: Selector,
    image: Selector,
    requested: Selector,
    owned: Selector,
    prime: Selector,
    add_to_cart: Selector,
    see_more: Selector,
    base: Selector,
}

impl PageSelectors {
    pub fn new() -> Result<Self, WishlistError> {
        Ok(Self {
            list_item: compile("ul li")?,
            title_link: compile("a[title][href]")?,
            price: compile(".a-price")?,
            price_text: compile(".a-offscreen")?,
            date_added: compile(".dateAddedText")?,
            date_added_text: compile("span")?,
            rating: compile(".a-icon-star-small .a-icon-alt")?,
            review_count: compile("a[id^='review_count_']")?,
            image: compile("[id^='itemImage_'] img[src]")?,
            requested: compile("[id^='itemRequested_']")?,
            owned: compile("[id^='itemPurchased_']")?,
            prime: compile(".a-icon-prime")?,
            add_to_cart: compile(".wl-info-aa_add_to_cart a[href]")?,
            see_more: compile("a.wl-see-more")?,
            base: compile("base[href]")?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, WishlistError> {
    Selector::parse(selector).map_err(|_| WishlistError::Selector(selector.to_string()))
}

/// Everything pulled out of one wishlist page.
#[derive(Debug, Default)]
pub struct PageExtract {
    /// Items in document order. An ID can repeat if the page lists it twice.
    pub items: Vec<Item>,
    pub next_page: Option<Url>,
}

/// Walks every list item on the page and finds the "see more" link.
pub fn extract_page(html: &str, page_url: &Url, selectors: &PageSelectors) -> PageExtract {
    let doc = Html::parse_document(html);
    let base = effective_base(&doc, page_url, selectors);

    let items = doc
        .select(&selectors.list_item)
        .filter_map(|list_item| extract_item(list_item, &base, selectors))
        .collect();

    PageExtract {
        items,
        next_page: next_page_url(&doc, &base, selectors),
    }
}

fn effective_base(doc: &Html, page_url: &Url, selectors: &PageSelectors) -> Url {
    doc.select(&selectors.base)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone())
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(String::from)
}

/// Returns `None` for rows that are not products: no identifier, or no link
/// carrying both a title and an href.
pub fn extract_item(list_item: ElementRef<'_>, base: &Url, selectors: &PageSelectors) -> Option<Item> {
    let id = list_item.value().attr(ITEM_ID_ATTR)?.trim();
    if id.is_empty() {
        return None;
    }

    let (name, direct_url) = list_item.select(&selectors.title_link).find_map(|link| {
        let title = link.value().attr("title")?.trim();
        if title.is_empty() {
            return None;
        }
        let url = resolve(base, link.value().attr("href")?)?;
        Some((title.to_string(), url))
    })?;

    let mut item = Item::new(id, name, direct_url);

    if let Some(price) = list_item.select(&selectors.price).next() {
        item.price = first_text(price, &selectors.price_text).unwrap_or_default();
    }

    if let Some(date) = list_item.select(&selectors.date_added).next() {
        let text = date
            .select(&selectors.date_added_text)
            .map(element_text)
            .collect::<Vec<_>>()
            .join("\n");
        item.date_added = parse_date_added(&text).unwrap_or_default();
    }

    item.rating = first_text(list_item, &selectors.rating);

    if let Some(reviews) = list_item.select(&selectors.review_count).next() {
        item.review_count = parse_count(&element_text(reviews)).unwrap_or_default();
        item.reviews_url = reviews.value().attr("href").and_then(|href| resolve(base, href));
    }

    item.image_url = list_item
        .select(&selectors.image)
        .next()
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| resolve(base, src));

    item.requested_count = first_text(list_item, &selectors.requested)
        .and_then(|text| parse_count(&text))
        .unwrap_or_default();
    item.owned_count = first_text(list_item, &selectors.owned)
        .and_then(|text| parse_count(&text))
        .unwrap_or_default();

    item.is_prime = list_item.select(&selectors.prime).next().is_some();

    item.add_to_cart_url = list_item
        .select(&selectors.add_to_cart)
        .next()
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| resolve(base, href));

    Some(item)
}

/// Absolute URL of the "see more" link, if the page has one with a non-empty href.
pub fn next_page_url(doc: &Html, base: &Url, selectors: &PageSelectors) -> Option<Url> {
    doc.select(&selectors.see_more)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .and_then(|href| base.join(href).ok())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// "Added July 10, 2019" -> "July 10, 2019". `None` when no line carries the marker.
pub fn parse_date_added(text: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.split_once(DATE_ADDED_MARKER))
        .map(|(_, date)| date.trim().to_string())
        .filter(|date| !date.is_empty())
}

/// Parses display counts such as "930" or "1,234".
pub fn parse_count(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',')
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://www.amazon.com/hz/wishlist/ls/3I6EQPZ8OB1DT?type=wishlist").unwrap()
    }

    fn extract(html: &str) -> PageExtract {
        extract_page(html, &page_url(), &PageSelectors::new().unwrap())
    }

    #[test]
    fn extracts_name_and_absolute_link() {
        let page = extract(
            r#"<ul>
                <li data-itemid="ITEM1">
                    <a href="/dp/B000000001">no title here</a>
                    <a title="Squeaky Toy" href="/dp/B000000001/ref=wl_it_dp">Squeaky Toy</a>
                    <a title="Second Link" href="/dp/B000000002">Second</a>
                </li>
            </ul>"#,
        );

        assert_eq!(page.items.len(), 1);
        let item = &page.items[0];
        assert_eq!(item.id, "ITEM1");
        assert_eq!(item.name, "Squeaky Toy");
        assert_eq!(item.direct_url, "https://www.amazon.com/dp/B000000001/ref=wl_it_dp");
        assert!(item.price.is_empty());
        assert!(item.date_added.is_empty());
        assert!(page.next_page.is_none());
    }

    #[test]
    fn skips_rows_without_id_or_link() {
        let page = extract(
            r#"<ul>
                <li><a title="Header" href="/header">Header</a></li>
                <li data-itemid=""><a title="Blank" href="/blank">Blank</a></li>
                <li data-itemid="NOLINK"><span class="a-price"><span class="a-offscreen">$1.00</span></span></li>
                <li data-itemid="NOHREF"><a title="Dangling">Dangling</a></li>
                <li data-itemid="KEEP"><a title="Kept" href="/dp/KEEP">Kept</a></li>
            </ul>"#,
        );

        let ids: Vec<_> = page.items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["KEEP"]);
    }

    #[test]
    fn optional_fields_are_independent() {
        let page = extract(
            r#"<ul>
                <li data-itemid="FULL">
                    <div id="itemImage_FULL"><a title="Bowl" href="/dp/BOWL"><img src="https://images.example.com/bowl.jpg"></a></div>
                    <i class="a-icon a-icon-star-small a-star-small-4"><span class="a-icon-alt">4.0 out of 5 stars</span></i>
                    <a id="review_count_FULL" href="/product-reviews/BOWL">1,204</a>
                    <span class="a-price"><span class="a-offscreen">$9.99</span><span aria-hidden="true">$9<sup>99</sup></span></span>
                    <i class="a-icon a-icon-prime a-icon-small"></i>
                    <span id="itemRequested_FULL">3</span>
                    <span id="itemPurchased_FULL">1</span>
                    <div class="dateAddedText"><span id="itemAddedDate_FULL">Added December 20, 2019</span></div>
                    <span class="wl-info-aa_add_to_cart"><a href="/gp/item-dispatch?offeringID.1=abc">Add to Cart</a></span>
                </li>
                <li data-itemid="BARE">
                    <a title="Leash" href="/dp/LEASH">Leash</a>
                    <div class="dateAddedText"><span>Bought recently</span></div>
                    <span id="itemRequested_BARE">lots</span>
                </li>
            </ul>"#,
        );

        let full = &page.items[0];
        assert_eq!(full.name, "Bowl");
        assert_eq!(full.price, "$9.99");
        assert_eq!(full.date_added, "December 20, 2019");
        assert_eq!(full.rating.as_deref(), Some("4.0 out of 5 stars"));
        assert_eq!(full.review_count, 1204);
        assert_eq!(full.reviews_url.as_deref(), Some("https://www.amazon.com/product-reviews/BOWL"));
        assert_eq!(full.image_url.as_deref(), Some("https://images.example.com/bowl.jpg"));
        assert_eq!(full.requested_count, 3);
        assert_eq!(full.owned_count, 1);
        assert!(full.is_prime);
        assert_eq!(
            full.add_to_cart_url.as_deref(),
            Some("https://www.amazon.com/gp/item-dispatch?offeringID.1=abc")
        );

        let bare = &page.items[1];
        assert_eq!(bare.name, "Leash");
        assert!(bare.date_added.is_empty());
        assert_eq!(bare.requested_count, 0);
        assert_eq!(bare.rating, None);
        assert!(!bare.is_prime);
    }

    #[test]
    fn finds_see_more_link() {
        let page = extract(
            r#"<ul><li data-itemid="A"><a title="A" href="/dp/A">A</a></li></ul>
               <a class="a-size-base wl-see-more" href="/hz/wishlist/slv/items?filter=DEFAULT&amp;paginationToken=abc">See more</a>"#,
        );

        assert_eq!(
            page.next_page.unwrap().as_str(),
            "https://www.amazon.com/hz/wishlist/slv/items?filter=DEFAULT&paginationToken=abc"
        );
    }

    #[test]
    fn ignores_see_more_without_href() {
        let page = extract(r#"<a class="wl-see-more" href="  ">See more</a><a class="wl-see-more">x</a>"#);
        assert!(page.next_page.is_none());
    }

    #[test]
    fn honours_base_element() {
        let page = extract(
            r#"<html><head><base href="https://smile.amazon.com/"></head><body>
               <ul><li data-itemid="B"><a title="B" href="dp/B">B</a></li></ul></body></html>"#,
        );
        assert_eq!(page.items[0].direct_url, "https://smile.amazon.com/dp/B");
    }

    #[test]
    fn date_added_takes_text_after_marker() {
        assert_eq!(parse_date_added("Added December 20, 2019").as_deref(), Some("December 20, 2019"));
        assert_eq!(
            parse_date_added("Item added by you\n  Added July 10, 2019  ").as_deref(),
            Some("July 10, 2019")
        );
        assert_eq!(parse_date_added("December 20, 2019"), None);
        assert_eq!(parse_date_added("Added "), None);
    }

    #[test]
    fn counts_accept_separators() {
        assert_eq!(parse_count("930"), Some(930));
        assert_eq!(parse_count(" 12,345 "), Some(12345));
        assert_eq!(parse_count("none"), None);
    }

    #[test]
    fn detects_robot_check() {
        assert!(is_robot_check("<p>Sorry, we just need to make sure you're not a robot.</p>"));
        assert!(!is_robot_check("<ul></ul>"));
    }
}
