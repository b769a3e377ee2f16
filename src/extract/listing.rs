//! HTML listing extraction
//!
//! Listing pages are split into one HTML fragment per server entry by the
//! source adapter (`split_items`); each fragment is then parsed on its own
//! so a broken entry never affects its neighbours.

use crate::extract::group::{infer_max_group, resolve_max_group};
use crate::extract::identity::server_id_from_href;
use crate::extract::wipe::{instant_or, parse_instant};
use crate::extract::{apply_rating_gate, Discard, ExtractError, ExtractOptions, Extraction};
use crate::model::{CandidateServer, PLACEHOLDER_NAME};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Link to a server's detail page on Just-Wiped listings
const DETAIL_LINK: &str = r#"a[title="Open the server details page"]"#;
const WIPE_TIME: &str = "time.timeago[datetime]";
const RATING: &str = ".rating";

/// Path prefix of Just-Wiped server detail pages
pub(crate) const SERVER_PATH: &str = "/rust_servers/";
const DETAIL_NAME: &str = "h1.server-name";
const DETAIL_WIPE_TIME: &str = "span.wipe-time";
const DETAIL_MAX_GROUP: &str = "span.max-group";

/// Splits a rendered page into the outer HTML of every element matching `selector`
///
/// # Returns
///
/// * `Ok(Vec<String>)` - One fragment per matching element, in document order
/// * `Err(ExtractError)` - The selector itself is invalid
pub fn split_items(html: &str, selector: &str) -> Result<Vec<String>, ExtractError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .map(|element| element.html())
        .collect())
}

/// Splits a Just-Wiped listing into one fragment per server detail link
///
/// Listings are not wrapped in a per-server container, so each detail link
/// opens an entry and collects the first rating label and the first
/// `time.timeago` that follow it in document order, up to the next link.
pub fn split_listing_entries(html: &str) -> Result<Vec<String>, ExtractError> {
    let link = parse_selector(DETAIL_LINK)?;
    let rating = parse_selector(RATING)?;
    let wipe_time = parse_selector(WIPE_TIME)?;
    let any = parse_selector(&format!("{}, {}, {}", DETAIL_LINK, RATING, WIPE_TIME))?;
    let document = Html::parse_document(html);

    let mut entries: Vec<ListingEntry> = Vec::new();
    for element in document.select(&any) {
        if link.matches(&element) {
            entries.push(ListingEntry {
                link: element.html(),
                rating: None,
                wipe_time: None,
            });
            continue;
        }

        let Some(entry) = entries.last_mut() else {
            continue;
        };
        if entry.rating.is_none() && rating.matches(&element) {
            entry.rating = Some(element.html());
        } else if entry.wipe_time.is_none() && wipe_time.matches(&element) {
            entry.wipe_time = Some(element.html());
        }
    }

    Ok(entries.into_iter().map(ListingEntry::into_fragment).collect())
}

/// Pieces of one listing entry, kept as outer HTML
struct ListingEntry {
    link: String,
    rating: Option<String>,
    wipe_time: Option<String>,
}

impl ListingEntry {
    fn into_fragment(self) -> String {
        format!(
            "<div>{}{}{}</div>",
            self.link,
            self.rating.unwrap_or_default(),
            self.wipe_time.unwrap_or_default()
        )
    }
}

/// Extracts a candidate from one Just-Wiped server entry
///
/// The entry must hold a detail link (`/rust_servers/<id>`); the wipe instant
/// comes from the entry's `time.timeago` element and defaults to
/// `observed_at`. The rating gate runs after identity so every discard can
/// be attributed to a server.
pub fn extract_listing_item(
    fragment: &str,
    observed_at: DateTime<Utc>,
    options: &ExtractOptions,
) -> Extraction {
    let document = Html::parse_fragment(fragment);
    let root = document.root_element();

    let link = match first(&root, DETAIL_LINK) {
        Ok(Some(link)) => link,
        Ok(None) => return Extraction::Malformed(ExtractError::MissingField("detail link")),
        Err(e) => return Extraction::Malformed(e),
    };

    let (server_id, server_name) = match identify(&link) {
        Ok(identity) => identity,
        Err(e) => return Extraction::Malformed(e),
    };

    let rating = first(&root, RATING)
        .ok()
        .flatten()
        .and_then(|el| parse_rating(&element_text(&el)));
    if let Some(reason) = apply_rating_gate(rating, options) {
        return Extraction::Discarded(Discard {
            server_id,
            server_name,
            reason,
        });
    }

    let wipe_attr = first(&root, WIPE_TIME)
        .ok()
        .flatten()
        .and_then(|el| el.value().attr("datetime").map(str::to_string));

    let max_group = infer_max_group(&server_name);
    Extraction::Candidate(CandidateServer::from_instant(
        server_id,
        server_name,
        max_group,
        instant_or(wipe_attr.as_deref(), observed_at),
        options.keep_instant,
    ))
}

/// Extracts a candidate from one rendered BattleMetrics table cell
///
/// The site shows no wipe instant in the list, so the slot is taken from
/// `observed_at`.
pub fn extract_browser_cell(fragment: &str, observed_at: DateTime<Utc>) -> Extraction {
    let document = Html::parse_fragment(fragment);
    let root = document.root_element();

    let link = match first(&root, "a[href]") {
        Ok(Some(link)) => link,
        Ok(None) => return Extraction::Malformed(ExtractError::MissingField("server link")),
        Err(e) => return Extraction::Malformed(e),
    };

    match identify(&link) {
        Ok((server_id, server_name)) => {
            let max_group = infer_max_group(&server_name);
            Extraction::Candidate(CandidateServer::from_instant(
                server_id,
                server_name,
                max_group,
                observed_at.fixed_offset(),
                false,
            ))
        }
        Err(e) => Extraction::Malformed(e),
    }
}

/// Collects the numeric server ids linked from a Just-Wiped page
///
/// Any `/rust_servers/<id>` link counts; non-numeric tails such as the map
/// link are skipped. Ids are returned once each, in document order.
pub fn server_ids_from_links(html: &str) -> Result<Vec<i64>, ExtractError> {
    let links = parse_selector("a[href]")?;
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    Ok(document
        .select(&links)
        .filter_map(|link| link.value().attr("href"))
        .filter(|href| is_server_detail_href(href))
        .filter_map(|href| server_id_from_href(href).ok())
        .filter(|id| seen.insert(*id))
        .collect())
}

/// Extracts a candidate from a Just-Wiped server detail page
///
/// Missing fields never make the page malformed: the name falls back to
/// `PLACEHOLDER_NAME` so a later listing run can repair it, the group cap
/// to the page's `max-group` label, and the wipe instant to `observed_at`.
/// Only an instant actually read from the page is kept on the legacy path.
pub fn extract_detail_page(
    server_id: i64,
    html: &str,
    observed_at: DateTime<Utc>,
    options: &ExtractOptions,
) -> Extraction {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let text_of = |selector: &str| {
        first(&root, selector)
            .ok()
            .flatten()
            .map(|el| element_text(&el))
            .filter(|text| !text.is_empty())
    };

    let server_name = text_of(DETAIL_NAME).unwrap_or_else(|| PLACEHOLDER_NAME.to_string());

    let reported_group = text_of(DETAIL_MAX_GROUP).and_then(|label| {
        first_number(&label)
            .map(i64::from)
            .or_else(|| infer_max_group(&label).map(i64::from))
    });
    let max_group = resolve_max_group(&server_name, reported_group);

    let wipe_instant = first(&root, DETAIL_WIPE_TIME)
        .ok()
        .flatten()
        .and_then(|el| {
            el.value()
                .attr("datetime")
                .map(str::to_string)
                .or_else(|| Some(element_text(&el)))
        })
        .and_then(|raw| parse_instant(&raw));

    Extraction::Candidate(CandidateServer::from_instant(
        server_id,
        server_name,
        max_group,
        wipe_instant.unwrap_or_else(|| observed_at.fixed_offset()),
        options.keep_instant && wipe_instant.is_some(),
    ))
}

/// Reads the first number in a rating label such as "55%" or "Rating: 72.5 %"
///
/// Fractions are truncated; values above 100 are rejected.
pub fn parse_rating(text: &str) -> Option<u8> {
    first_number(text).filter(|v| *v <= 100).map(|v| v as u8)
}

fn first_number(text: &str) -> Option<u16> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()
}

fn is_server_detail_href(href: &str) -> bool {
    let path = Url::parse(href)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| href.to_string());
    path.starts_with(SERVER_PATH)
}

/// Id and display name from a detail link
fn identify(link: &ElementRef<'_>) -> Result<(i64, String), ExtractError> {
    let href = link
        .value()
        .attr("href")
        .ok_or(ExtractError::MissingField("href"))?;
    let server_id = server_id_from_href(href)?;

    let name = element_text(link);
    if name.is_empty() {
        return Err(ExtractError::EmptyName);
    }

    Ok((server_id, name))
}

fn first<'a>(root: &ElementRef<'a>, selector: &str) -> Result<Option<ElementRef<'a>>, ExtractError> {
    let selector = parse_selector(selector)?;
    Ok(root.select(&selector).next())
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Markup(format!("{}: {:?}", selector, e)))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DiscardReason;
    use chrono::TimeZone;

    fn observed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 17, 0, 0).unwrap()
    }

    fn gated() -> ExtractOptions {
        ExtractOptions {
            min_rating: Some(60),
            keep_instant: true,
        }
    }

    fn entry(href: &str, name: &str, rating: &str, datetime: &str) -> String {
        format!(
            r#"<div class="server">
                <a title="Open the server details page" href="{}">  {}  </a>
                <div class="rating">{}</div>
                <time class="timeago" datetime="{}">2 hours ago</time>
            </div>"#,
            href, name, rating, datetime
        )
    }

    #[test]
    fn test_split_items() {
        let page = format!(
            "<html><body><div class='list'>{}{}</div><a href='/rust_servers/map'>Map</a></body></html>",
            entry("/rust_servers/1", "A", "90%", "2024-01-04T18:00:00Z"),
            entry("/rust_servers/2", "B", "80%", "2024-01-04T18:00:00Z"),
        );
        let items = split_items(&page, "div.server").unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].contains("/rust_servers/1"));
    }

    #[test]
    fn test_split_listing_entries_without_containers() {
        let page = r#"<html><body><table>
            <tr>
              <td><a title="Open the server details page" href="/rust_servers/11">Alpha Duo</a></td>
              <td><span class="rating">91%</span></td>
              <td><time class="timeago" datetime="2024-01-04T18:00:00Z">1 hour ago</time></td>
            </tr>
            <tr>
              <td><a title="Open the server details page" href="/rust_servers/12">Bravo</a></td>
            </tr>
            <tr>
              <td><a title="Open the server details page" href="/rust_servers/13">Charlie Trio</a></td>
              <td><time class="timeago" datetime="2024-01-05T01:00:00Z">now</time></td>
              <td><span class="rating">70%</span></td>
            </tr>
        </table><a href="/rust_servers/map">Map</a></body></html>"#;

        let items = split_listing_entries(page).unwrap();
        assert_eq!(items.len(), 3);
        assert!(items[0].contains("/rust_servers/11"));
        assert!(items[0].contains("91%"));
        assert!(items[0].contains("2024-01-04T18:00:00Z"));
        assert!(!items[1].contains("timeago"));
        assert!(items[2].contains("70%"));
        assert!(items[2].contains("2024-01-05T01:00:00Z"));

        match extract_listing_item(&items[2], observed(), &gated()) {
            Extraction::Candidate(c) => {
                assert_eq!(c.server_id, 13);
                assert_eq!(c.max_group, Some(3));
                assert_eq!(c.slot.wipe_hour, "8pm est");
            }
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_split_listing_entries_inside_containers() {
        let page = format!(
            "<html><body>{}{}</body></html>",
            entry("/rust_servers/1", "A", "90%", "2024-01-04T18:00:00Z"),
            entry("/rust_servers/2", "B", "80%", "2024-01-06T18:00:00Z"),
        );
        let items = split_listing_entries(&page).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[1].contains("80%"));
        assert!(items[1].contains("2024-01-06T18:00:00Z"));
    }

    #[test]
    fn test_split_items_invalid_selector() {
        assert!(matches!(
            split_items("<html></html>", "div[[["),
            Err(ExtractError::Markup(_))
        ));
    }

    #[test]
    fn test_listing_entry() {
        let html = entry(
            "/rust_servers/41234",
            "Moose EU Duo Weekly",
            "87%",
            "2024-01-04T18:00:00Z",
        );
        match extract_listing_item(&html, observed(), &gated()) {
            Extraction::Candidate(c) => {
                assert_eq!(c.server_id, 41234);
                assert_eq!(c.server_name, "Moose EU Duo Weekly");
                assert_eq!(c.max_group, Some(2));
                assert_eq!(c.slot.day_name, "Thursday");
                assert_eq!(c.slot.wipe_hour, "1pm est");
                assert_eq!(
                    c.wipe_time,
                    Some(Utc.with_ymd_and_hms(2024, 1, 4, 18, 0, 0).unwrap())
                );
            }
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_low_rating_is_discarded_not_malformed() {
        let html = entry("/rust_servers/9", "Low Pop", "55%", "2024-01-04T18:00:00Z");
        assert_eq!(
            extract_listing_item(&html, observed(), &gated()),
            Extraction::Discarded(Discard {
                server_id: 9,
                server_name: "Low Pop".to_string(),
                reason: DiscardReason::BelowRating {
                    rating: 55,
                    threshold: 60
                },
            })
        );
    }

    #[test]
    fn test_missing_rating_passes_without_gate() {
        let html = r#"<div class="server"><a title="Open the server details page" href="/rust_servers/3">Solo</a></div>"#;
        let options = ExtractOptions::default();
        match extract_listing_item(html, observed(), &options) {
            Extraction::Candidate(c) => {
                assert_eq!(c.max_group, Some(1));
                assert_eq!(c.slot.day_name, "Friday");
                assert_eq!(c.wipe_time, None);
            }
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_map_link_yields_no_candidate() {
        let html = entry("/rust_servers/map", "Map", "99%", "2024-01-04T18:00:00Z");
        assert_eq!(
            extract_listing_item(&html, observed(), &gated()),
            Extraction::Malformed(ExtractError::NonNumericId("map".to_string()))
        );
    }

    #[test]
    fn test_entry_without_link() {
        let html = r#"<div class="server"><span>ad slot</span></div>"#;
        assert_eq!(
            extract_listing_item(html, observed(), &gated()),
            Extraction::Malformed(ExtractError::MissingField("detail link"))
        );
    }

    #[test]
    fn test_browser_cell() {
        let cell = r#"<td class="css-1su1bxu"><a href="/servers/rust/123456">[EU] Quad Monthly</a></td>"#;
        match extract_browser_cell(cell, observed()) {
            Extraction::Candidate(c) => {
                assert_eq!(c.server_id, 123456);
                assert_eq!(c.server_name, "[EU] Quad Monthly");
                assert_eq!(c.max_group, Some(4));
                assert_eq!(c.slot.wipe_hour, "12pm est");
                assert_eq!(c.wipe_time, None);
            }
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_browser_cell_without_link() {
        let cell = r#"<td class="css-1su1bxu">loading…</td>"#;
        assert_eq!(
            extract_browser_cell(cell, observed()),
            Extraction::Malformed(ExtractError::MissingField("server link"))
        );
    }

    #[test]
    fn test_server_ids_from_links() {
        let page = r#"<html><body>
            <a href="/rust_servers/41">Alpha</a>
            <a href="/rust_servers/map">Map</a>
            <a href="https://just-wiped.net/rust_servers/42?tab=wipes">Bravo</a>
            <a href="/rust_servers/41">Alpha again</a>
            <a href="/servers/43">Elsewhere</a>
        </body></html>"#;
        assert_eq!(server_ids_from_links(page).unwrap(), vec![41, 42]);
    }

    #[test]
    fn test_detail_page() {
        let page = r#"<html><body>
            <h1 class="server-name"> Rusty Moose |EU Monthly| </h1>
            <span class="wipe-time">2024-01-04T18:00:00Z</span>
            <span class="max-group">3</span>
        </body></html>"#;
        match extract_detail_page(77, page, observed(), &gated()) {
            Extraction::Candidate(c) => {
                assert_eq!(c.server_id, 77);
                assert_eq!(c.server_name, "Rusty Moose |EU Monthly|");
                assert_eq!(c.max_group, Some(3));
                assert_eq!(c.slot.day_name, "Thursday");
                assert!(c.wipe_time.is_some());
            }
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_detail_page_without_fields_is_placeholder() {
        let page = "<html><body><p>Server offline</p></body></html>";
        match extract_detail_page(78, page, observed(), &gated()) {
            Extraction::Candidate(c) => {
                assert_eq!(c.server_name, PLACEHOLDER_NAME);
                assert_eq!(c.max_group, None);
                assert_eq!(c.slot.day_name, "Friday");
                assert_eq!(c.wipe_time, None);
            }
            other => panic!("expected candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("55%"), Some(55));
        assert_eq!(parse_rating("Rating: 72.5 %"), Some(72));
        assert_eq!(parse_rating("100%"), Some(100));
        assert_eq!(parse_rating("250%"), None);
        assert_eq!(parse_rating("n/a"), None);
    }
}
