use scraper::{Html, Selector};
use url::Url;

/// Target of the first hyperlink in a relay notification page
pub fn first_link(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    let link_selector = Selector::parse("a[href]").ok()?;
    let link = doc
        .select(&link_selector)
        .filter_map(|e| e.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(|s| s.to_string());

    ::log::debug!("Relay notification link: {:?}", link);
    link
}

/// Percent-decoded last path segment of a download URL
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.rfind(|s| !s.is_empty())?;

    let name = match urlencoding::decode(segment) {
        Ok(name) => name.into_owned(),
        Err(_) => segment.to_string(),
    };

    // The name becomes a path below the archive root
    let name = name.replace(['/', '\\'], "_");
    if name == "." || name == ".." {
        return None;
    }
    Some(name)
}
