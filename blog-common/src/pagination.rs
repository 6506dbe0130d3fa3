//! Page-number pagination over a counted result set.
//!
//! Page numbers come straight from the query string, so resolution never fails:
//! anything that is not an integer selects the first page and integers outside
//! `1..=num_pages` select the last page.

use std::num::{IntErrorKind, NonZeroUsize};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Paginator {
    count: usize,
    per_page: NonZeroUsize,
}

impl Paginator {
    #[must_use]
    pub fn new(count: usize, per_page: NonZeroUsize) -> Self {
        Self { count, per_page }
    }

    #[must_use]
    pub fn per_page(self) -> NonZeroUsize {
        self.per_page
    }

    /// Always at least 1, an empty result set has one empty page.
    #[must_use]
    pub fn num_pages(self) -> usize {
        self.count.div_ceil(self.per_page.get()).max(1)
    }

    #[must_use]
    pub fn resolve(self, requested: Option<&str>) -> usize {
        let Some(requested) = requested else {
            return 1;
        };

        match requested.trim().parse::<i64>() {
            Ok(number) => usize::try_from(number)
                .ok()
                .filter(|number| (1..=self.num_pages()).contains(number))
                .unwrap_or(self.num_pages()),
            Err(err) if matches!(err.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                self.num_pages()
            }
            Err(_) => 1,
        }
    }

    /// Number of items before page `number`.
    #[must_use]
    pub fn offset(self, number: usize) -> usize {
        number.saturating_sub(1) * self.per_page.get()
    }

    #[must_use]
    pub fn page<T>(self, number: usize, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
}

impl<T> Page<T> {
    #[must_use]
    pub fn previous_number(&self) -> Option<usize> {
        (self.number > 1).then(|| self.number - 1)
    }

    #[must_use]
    pub fn next_number(&self) -> Option<usize> {
        (self.number < self.num_pages).then(|| self.number + 1)
    }
}
