//! Task configuration form: URL selectors and content selectors
//!
//! A task is edited as two ordered lists of rows. New rows start as a copy of
//! the last row and the last remaining row can never be removed, so a saved
//! task always has at least one URL selector and one content selector.

use crate::error::{Error, Result};
use crate::types::TaskName;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Value type a content selector casts its match to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    /// Whole number
    Integer,
    /// Free text (default)
    #[default]
    String,
    /// Date and time
    Datetime,
    /// Decimal number
    Float,
}

impl SelectorType {
    /// Numeric code used in the task form
    pub fn code(self) -> u8 {
        match self {
            SelectorType::Integer => 0,
            SelectorType::String => 1,
            SelectorType::Datetime => 2,
            SelectorType::Float => 3,
        }
    }

    /// Inverse of [`code`](Self::code)
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SelectorType::Integer),
            1 => Some(SelectorType::String),
            2 => Some(SelectorType::Datetime),
            3 => Some(SelectorType::Float),
            _ => None,
        }
    }

    /// Regex applied by the server when a selector leaves its regex empty
    pub fn default_regex(self) -> &'static str {
        match self {
            SelectorType::Integer | SelectorType::Datetime => r"\d[\d.,]*",
            SelectorType::String => r"[^\n\r ,.][^\n\r]+",
            SelectorType::Float => r"\d[\d.,:]*",
        }
    }
}

/// Extraction rule for one named field of a result
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSpec {
    /// Field name
    pub name: String,
    /// XPath locating the value on the page
    pub xpath: String,
    /// Value type
    #[serde(rename = "type", default)]
    pub kind: SelectorType,
    /// Regex narrowing the match (empty = type default)
    #[serde(default)]
    pub regex: String,
    /// Whether this field is part of the result key
    #[serde(default)]
    pub is_key: bool,
}

impl SelectorSpec {
    /// Regex the server will actually apply
    pub fn effective_regex(&self) -> &str {
        if self.regex.is_empty() {
            self.kind.default_regex()
        } else {
            &self.regex
        }
    }

    /// Whether the effective regex parses here
    ///
    /// The server applies patterns with its own regex engine, which accepts
    /// constructs this one does not (look-around, backreferences). A pattern
    /// that fails here is logged and still sent.
    pub fn regex_parses_locally(&self) -> bool {
        Regex::new(self.effective_regex()).is_ok()
    }
}

/// Source of the URLs a task crawls
///
/// A URL containing `%s` placeholders is dynamic: the server fills the
/// placeholders from the `selector_name`/`selector_name2` fields of another
/// task's results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlSelectorSpec {
    /// URL, possibly with `%s` placeholders
    pub url: String,
    /// Task whose results fill the placeholders
    pub results_task: String,
    /// Result field for the first placeholder
    #[serde(default)]
    pub selector_name: String,
    /// Result field for the second placeholder
    #[serde(default)]
    pub selector_name2: String,
}

impl UrlSelectorSpec {
    /// Number of `%s` placeholders in the URL
    pub fn placeholder_count(&self) -> usize {
        self.url.matches("%s").count()
    }

    /// Whether the URL is filled from another task's results
    pub fn has_dynamic_url(&self) -> bool {
        self.placeholder_count() > 0
    }
}

/// Editable configuration of one task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskForm {
    /// Task being edited
    pub name: TaskName,
    /// URL selector rows, in form order
    pub url_selectors: Vec<UrlSelectorSpec>,
    /// Content selector rows, in form order
    pub selectors: Vec<SelectorSpec>,
}

impl TaskForm {
    /// Form for a new task: one URL row reading its own results, one key selector
    pub fn new(name: TaskName) -> Self {
        let url_selectors = vec![UrlSelectorSpec {
            results_task: name.to_string(),
            ..Default::default()
        }];
        let selectors = vec![SelectorSpec {
            is_key: true,
            ..Default::default()
        }];
        Self {
            name,
            url_selectors,
            selectors,
        }
    }

    /// Append a copy of the last URL selector row
    pub fn add_url_selector(&mut self) -> &mut UrlSelectorSpec {
        let row = self.url_selectors.last().cloned().unwrap_or_else(|| UrlSelectorSpec {
            results_task: self.name.to_string(),
            ..Default::default()
        });
        self.url_selectors.push(row);
        let last = self.url_selectors.len() - 1;
        &mut self.url_selectors[last]
    }

    /// Remove the last URL selector row unless it is the only one
    pub fn remove_url_selector(&mut self) -> Option<UrlSelectorSpec> {
        if self.url_selectors.len() > 1 {
            self.url_selectors.pop()
        } else {
            None
        }
    }

    /// Append a copy of the last content selector row
    pub fn add_content_selector(&mut self) -> &mut SelectorSpec {
        let row = self.selectors.last().cloned().unwrap_or_default();
        self.selectors.push(row);
        let last = self.selectors.len() - 1;
        &mut self.selectors[last]
    }

    /// Remove the last content selector row unless it is the only one
    pub fn remove_content_selector(&mut self) -> Option<SelectorSpec> {
        if self.selectors.len() > 1 {
            self.selectors.pop()
        } else {
            None
        }
    }

    /// Names of the content selectors, in form order
    pub fn selector_names(&self) -> Vec<&str> {
        self.selectors.iter().map(|s| s.name.as_str()).collect()
    }

    /// Reject forms the server cannot store
    ///
    /// Empty names, URLs and xpaths are accepted, as in the form a new task
    /// starts with.
    pub fn validate(&self) -> Result<()> {
        if self.url_selectors.is_empty() {
            return Err(Error::validation("url selectors", "at least one is required"));
        }
        if self.selectors.is_empty() {
            return Err(Error::validation("selectors", "at least one is required"));
        }
        for (row, url) in self.url_selectors.iter().enumerate() {
            if url.placeholder_count() > 2 {
                return Err(Error::validation(
                    format!("url {row}"),
                    "at most two %s placeholders are supported",
                ));
            }
        }
        for (row, selector) in self.selectors.iter().enumerate() {
            if !selector.regex_parses_locally() {
                warn!(
                    task = %self.name,
                    row,
                    regex = %selector.effective_regex(),
                    "selector regex does not parse locally, leaving it to the server"
                );
            }
        }
        Ok(())
    }

    /// Encode the form the way the task editor submits it
    ///
    /// Row fields are repeated `name[]` keys in row order; `selector_is_key`
    /// carries the index of every key row.
    pub fn to_form_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("name".to_string(), self.name.to_string())];

        for url in &self.url_selectors {
            pairs.push(("url[]".into(), url.url.clone()));
            pairs.push(("url_results_id[]".into(), url.results_task.clone()));
            pairs.push(("url_selector_name[]".into(), url.selector_name.clone()));
            pairs.push(("url_selector_name2[]".into(), url.selector_name2.clone()));
        }

        for (index, selector) in self.selectors.iter().enumerate() {
            if selector.is_key {
                pairs.push(("selector_is_key".into(), index.to_string()));
            }
            pairs.push(("selector_name[]".into(), selector.name.clone()));
            pairs.push(("selector_xpath[]".into(), selector.xpath.clone()));
            pairs.push(("selector_type[]".into(), selector.kind.code().to_string()));
            pairs.push(("selector_regex[]".into(), selector.regex.clone()));
        }

        pairs
    }
}
