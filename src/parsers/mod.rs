pub mod index;
pub mod relay;


use scraper::ElementRef;

/// Visible text of an element with runs of whitespace collapsed to single spaces
pub fn visible_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
