use serde::Serialize;

/// Posts shown per listing page.
pub const POSTS_PER_PAGE: u64 = 10;

/// A bounded slice of an ordered query result plus paging metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub per_page: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, number: u64, total_items: u64, per_page: u64) -> Self {
        let total_pages = total_pages(total_items, per_page);
        Self {
            items,
            number,
            total_pages,
            total_items,
            per_page,
            has_previous: number > 1,
            has_next: number < total_pages,
        }
    }
}

/// ceil(total / per_page), never less than one: an empty queryset still
/// yields a single empty page.
pub fn total_pages(total_items: u64, per_page: u64) -> u64 {
    if total_items == 0 {
        return 1;
    }
    total_items.div_ceil(per_page)
}

/// Clamps a requested page number to the nearest valid page. Anything below
/// one (including unparsable input mapped to a default of 1 by the caller)
/// lands on the first page, anything past the end on the last.
pub fn clamp_page(requested: i64, total_items: u64, per_page: u64) -> u64 {
    let last = total_pages(total_items, per_page);
    if requested < 1 {
        1
    } else {
        (requested as u64).min(last)
    }
}

pub fn page_offset(number: u64, per_page: u64) -> u64 {
    (number - 1) * per_page
}
