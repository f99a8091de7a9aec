//! Query state: the single source of truth for filter, sort and page.
//!
//! # Design
//! Every transition that replaces the filter or the sort resets the page to 0
//! inside the same `&mut self` call, so no reader can observe a page index
//! that belonged to a previous query. `set_page` does not clamp: indices
//! outside the last known page count are rejected and leave the state as is.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::QueryError;
use crate::types::{Filter, Sort, PAGE_SIZE};

/// Characters left unescaped in query values and path segments (RFC 3986
/// unreserved set).
pub(crate) const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Value identity of one list request: filter, sort and page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSignature {
    filter: Filter,
    sort: Sort,
    page: u32,
}

impl RequestSignature {
    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Ordered list-endpoint parameters. Absent optional fields have no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParameters(Vec<(&'static str, String)>);

impl RequestParameters {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(k, _)| *k)
    }

    /// Percent-encoded `k=v&k=v` form, in parameter order.
    pub fn to_query_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={}", utf8_percent_encode(v, UNRESERVED)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryState {
    filter: Filter,
    sort: Sort,
    page: u32,
    total_pages: u32,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Page count reported by the last committed list response.
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Replace the filter wholesale and return to the first page.
    pub fn set_filter(&mut self, mut filter: Filter) {
        if filter.text.as_deref().is_some_and(is_blank) {
            filter.text = None;
        }
        self.filter = filter;
        self.page = 0;
    }

    /// Replace the sort wholesale and return to the first page.
    pub fn set_sort(&mut self, sort: Sort) {
        self.sort = sort;
        self.page = 0;
    }

    pub fn set_page(&mut self, page: u32) -> Result<(), QueryError> {
        if page >= self.total_pages {
            return Err(QueryError::PageOutOfRange {
                requested: page,
                total_pages: self.total_pages,
            });
        }
        self.page = page;
        Ok(())
    }

    pub(crate) fn record_total_pages(&mut self, total_pages: u32) {
        self.total_pages = total_pages;
    }

    pub fn signature(&self) -> RequestSignature {
        RequestSignature {
            filter: self.filter.clone(),
            sort: self.sort,
            page: self.page,
        }
    }

    pub fn to_request_parameters(&self) -> RequestParameters {
        let mut params = Vec::with_capacity(7);
        if let Some(text) = self.filter.text.as_deref().filter(|t| !is_blank(t)) {
            params.push(("text", text.to_string()));
        }
        if let Some(priority) = self.filter.priority {
            params.push(("priority", priority.as_str().to_string()));
        }
        if let Some(done) = self.filter.done {
            params.push(("done", done.to_string()));
        }
        if let Some(key) = self.sort.sort_by {
            params.push(("sortBy", key.as_str().to_string()));
        }
        if let Some(direction) = self.sort.direction {
            params.push(("sortDirection", direction.as_str().to_string()));
        }
        params.push(("page", self.page.to_string()));
        params.push(("size", PAGE_SIZE.to_string()));
        RequestParameters(params)
    }
}

/// Blank text places no constraint on the list, matching the server's trim.
fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Priority, SortDirection, SortKey};

    fn state_with_pages(total_pages: u32) -> QueryState {
        let mut state = QueryState::new();
        state.record_total_pages(total_pages);
        state
    }

    #[test]
    fn initial_state_requests_first_page() {
        let params = QueryState::new().to_request_parameters();
        assert_eq!(params.to_query_string(), "page=0&size=10");
    }

    #[test]
    fn filter_and_sort_changes_reset_page() {
        let mut state = state_with_pages(5);
        let steps: Vec<Box<dyn Fn(&mut QueryState)>> = vec![
            Box::new(|s: &mut QueryState| s.set_filter(Filter::default().with_done(true))),
            Box::new(|s: &mut QueryState| s.set_sort(Sort::by(SortKey::Priority, SortDirection::Desc))),
            Box::new(|s: &mut QueryState| s.set_filter(Filter::default())),
            Box::new(|s: &mut QueryState| s.set_sort(Sort::default())),
        ];
        for step in steps {
            state.set_page(3).unwrap();
            step(&mut state);
            assert_eq!(state.page(), 0);
        }
    }

    #[test]
    fn page_change_keeps_filter_and_sort() {
        let mut state = state_with_pages(3);
        state.set_filter(Filter::default().with_priority(Priority::Low));
        state.set_sort(Sort::by(SortKey::DueDate, SortDirection::Asc));
        state.set_page(2).unwrap();
        assert_eq!(state.page(), 2);
        assert_eq!(state.filter().priority, Some(Priority::Low));
        assert_eq!(state.sort().sort_by, Some(SortKey::DueDate));
    }

    #[test]
    fn out_of_range_page_is_rejected() {
        let mut state = state_with_pages(2);
        state.set_page(1).unwrap();
        let err = state.set_page(2).unwrap_err();
        assert_eq!(
            err,
            QueryError::PageOutOfRange {
                requested: 2,
                total_pages: 2
            }
        );
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn any_page_is_rejected_before_first_fetch() {
        let mut state = QueryState::new();
        assert!(state.set_page(0).is_err());
    }

    #[test]
    fn absent_fields_are_omitted() {
        let mut state = QueryState::new();
        state.set_filter(Filter::default().with_done(true));
        let params = state.to_request_parameters();
        assert_eq!(params.keys().collect::<Vec<_>>(), vec!["done", "page", "size"]);
        assert_eq!(params.get("done"), Some("true"));
    }

    #[test]
    fn empty_text_is_treated_as_absent() {
        let mut state = QueryState::new();
        state.set_filter(Filter::default().with_text(""));
        assert!(state.filter().text.is_none());
        assert!(state.to_request_parameters().get("text").is_none());
        assert_eq!(state.signature(), QueryState::new().signature());
    }

    #[test]
    fn whitespace_text_is_treated_as_absent() {
        let mut state = QueryState::new();
        state.set_filter(Filter::default().with_text("   "));
        assert!(state.filter().text.is_none());
        assert_eq!(state.to_request_parameters().to_query_string(), "page=0&size=10");
        assert_eq!(state.signature(), QueryState::new().signature());
    }

    #[test]
    fn full_query_in_canonical_order() {
        let mut state = QueryState::new();
        state.set_filter(Filter {
            text: Some("milk & eggs".to_string()),
            priority: Some(Priority::High),
            done: Some(false),
        });
        state.set_sort(Sort::by(SortKey::DueDate, SortDirection::Desc));
        assert_eq!(
            state.to_request_parameters().to_query_string(),
            "text=milk%20%26%20eggs&priority=HIGH&done=false&sortBy=dueDate&sortDirection=desc&page=0&size=10"
        );
    }

    #[test]
    fn signature_tracks_page() {
        let mut state = state_with_pages(4);
        let before = state.signature();
        state.set_page(1).unwrap();
        assert_ne!(before, state.signature());
        assert_eq!(state.signature().page(), 1);
    }
}
