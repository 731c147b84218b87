//! Business logic between the HTTP/AMQP surfaces and the repositories.
//!
//! Services validate payloads, translate "not found" into client-facing
//! errors, and run the cache-aside policy for users and products. Each
//! service is cheap to construct per request from [`AppState`].

pub mod addresses;
pub mod orders;
pub mod products;
pub mod users;

pub use addresses::AddressService;
pub use orders::OrderService;
pub use products::ProductService;
pub use users::UserService;

use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::filters::{FilterPlan, FilterSet, Page};

/// Longest accepted length for short text fields.
const MAX_FIELD_LEN: usize = 255;

/// Reject empty or oversized required text fields.
pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(AppError::Validation(format!(
            "{field} must be at most {MAX_FIELD_LEN} characters"
        )));
    }
    Ok(())
}

/// Parse list query parameters into a filter plan and a page selection.
pub(crate) fn parse_listing(
    filters: &FilterSet,
    params: &HashMap<String, String>,
) -> Result<(FilterPlan, Page)> {
    let pairs = || params.iter().map(|(k, v)| (k.as_str(), v.as_str()));
    let plan = filters.plan(pairs())?;
    let page = Page::from_query(pairs())?;
    Ok((plan, page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::USER_FILTERS;

    #[test]
    fn require_text_rejects_blank_and_oversized() {
        assert!(require_text("username", "alice").is_ok());
        assert!(require_text("username", "  ").is_err());
        assert!(require_text("username", &"x".repeat(256)).is_err());
    }

    #[test]
    fn parse_listing_splits_filters_and_pagination() {
        let params = HashMap::from([
            ("username".to_owned(), "alice".to_owned()),
            ("page".to_owned(), "2".to_owned()),
            ("count".to_owned(), "5".to_owned()),
        ]);
        let (plan, page) = parse_listing(&USER_FILTERS, &params).expect("valid");
        assert_eq!(plan.len(), 1);
        assert_eq!(page.page(), 2);
        assert_eq!(page.count(), 5);
    }

    #[test]
    fn parse_listing_rejects_bad_pagination() {
        let params = HashMap::from([("page".to_owned(), "0".to_owned())]);
        assert!(parse_listing(&USER_FILTERS, &params).is_err());
    }
}
