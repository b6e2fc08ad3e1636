//! Field validation for request bodies and queries.
//!
//! # Invariants
//! - Lengths are counted in characters, not bytes.
//! - All failing fields are reported together, never only the first.

use once_cell::sync::Lazy;
use regex::Regex;
use tilnote_core::{CoreError, CoreResult, FieldError, Page};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});

pub const NAME_LEN: (usize, usize) = (2, 32);
pub const PASSWORD_LEN: (usize, usize) = (8, 32);
pub const EMAIL_MAX_LEN: usize = 64;
pub const TITLE_LEN: (usize, usize) = (1, 64);
pub const TAG_LEN: (usize, usize) = (1, 64);
pub const MAX_TAGS: usize = 32;
pub const MEMO_DATE_LEN: usize = 8;
pub const MAX_ITEMS_PER_PAGE: u32 = 100;

/// Accumulates field errors across one request.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn length(&mut self, field: &str, value: &str, (min, max): (usize, usize)) {
        let len = value.chars().count();
        if len < min || len > max {
            self.fail(field, format!("length must be between {min} and {max} characters"));
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if value.chars().count() > EMAIL_MAX_LEN {
            self.fail(field, format!("must be at most {EMAIL_MAX_LEN} characters"));
        } else if !EMAIL_RE.is_match(value) {
            self.fail(field, "must be a valid email address");
        }
    }

    pub fn not_empty(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.fail(field, "must not be empty");
        }
    }

    /// `YYYYMMDD`-style key: exactly eight ASCII digits.
    pub fn memo_date(&mut self, field: &str, value: &str) {
        if value.len() != MEMO_DATE_LEN || !value.bytes().all(|byte| byte.is_ascii_digit()) {
            self.fail(field, "must be 8 digits (YYYYMMDD)");
        }
    }

    pub fn tags(&mut self, field: &str, tags: &[String]) {
        if tags.len() > MAX_TAGS {
            self.fail(field, format!("at most {MAX_TAGS} tags are allowed"));
        }
        for (index, tag) in tags.iter().enumerate() {
            self.length(&format!("{field}[{index}]"), tag, TAG_LEN);
        }
    }

    pub fn finish(self) -> CoreResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(self.errors))
        }
    }
}

/// Resolves optional pagination query values against the defaults.
pub fn page_from_query(page: Option<u32>, items_per_page: Option<u32>) -> CoreResult<Page> {
    let defaults = Page::default();
    let page = page.unwrap_or(defaults.page);
    let items_per_page = items_per_page.unwrap_or(defaults.items_per_page);
    if items_per_page > MAX_ITEMS_PER_PAGE {
        return Err(CoreError::invalid(
            "items_per_page",
            format!("must be at most {MAX_ITEMS_PER_PAGE}"),
        ));
    }
    Page::new(page, items_per_page)
}
