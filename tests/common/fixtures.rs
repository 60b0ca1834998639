//! Result pages and task forms used across tests

use serde_json::{Value, json};
use webscraper_client::{SelectorSpec, SelectorType, TaskForm, TaskName};

/// Cursors the server hands out for the three-page "alpha" export
pub const ALPHA_CURSORS: [&str; 3] = ["", "c1", "c2"];

/// Records per page of the "alpha" export
pub const ALPHA_PAGE_SIZES: [usize; 3] = [10, 10, 4];

/// Wire body of a page of structured records
pub fn records_page(cursor: Option<&str>, has_next: bool, ids: std::ops::Range<usize>) -> Value {
    let results: Vec<Value> = ids
        .map(|i| json!({ "id": i, "title": format!("listing {i}") }))
        .collect();
    json!({ "cursor": cursor, "has_next": has_next, "results": results })
}

/// Wire body of a pre-rendered text page
pub fn text_page(cursor: Option<&str>, has_next: bool, text: &str) -> Value {
    json!({ "cursor": cursor, "has_next": has_next, "results": text })
}

/// The three pages of "alpha": 10 + 10 + 4 records, answered for cursors "", "c1", "c2"
pub fn alpha_pages() -> Vec<(&'static str, Value)> {
    vec![
        ("", records_page(Some("c1"), true, 0..10)),
        ("c1", records_page(Some("c2"), true, 10..20)),
        ("c2", records_page(None, false, 20..24)),
    ]
}

/// Task name shorthand
pub fn task(name: &str) -> TaskName {
    TaskName::new(name).expect("fixture task names are valid")
}

/// A valid two-selector form for `name`
pub fn listing_form(name: &str) -> TaskForm {
    let mut form = TaskForm::new(task(name));
    form.url_selectors[0].url = "http://example.com/listings".to_string();
    form.selectors[0] = SelectorSpec {
        name: "id".to_string(),
        xpath: "//article/@data-id".to_string(),
        kind: SelectorType::Integer,
        regex: String::new(),
        is_key: true,
    };
    let price = form.add_content_selector();
    price.name = "price".to_string();
    price.xpath = "//article//span[@class='price']/text()".to_string();
    price.kind = SelectorType::Float;
    price.is_key = false;
    form
}
