//! Pagination and sorting

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Maximum items per page
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default items per page
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items per page (1..=100)
    pub page_size: u32,
}

impl Pagination {
    /// Create pagination, rejecting out-of-range values.
    pub fn new(page: u32, page_size: u32) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();
        if page == 0 {
            errors.push(ValidationError::OutOfRange {
                field: "page",
                min: 1,
                max: u32::MAX as u64,
            });
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            errors.push(ValidationError::OutOfRange {
                field: "page_size",
                min: 1,
                max: MAX_PAGE_SIZE as u64,
            });
        }

        match ValidationError::combine(errors) {
            Some(err) => Err(err),
            None => Ok(Self { page, page_size }),
        }
    }

    /// Calculate SQL OFFSET value.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    /// Get LIMIT value.
    pub fn limit(&self) -> u32 {
        self.page_size
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    /// Items for current page
    pub items: Vec<T>,
    /// Total count across all pages
    pub total: u64,
    /// Current page number
    pub page: u32,
    /// Items per page
    pub page_size: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            page_size: pagination.page_size,
        }
    }

    /// Total number of pages; zero when there are no items.
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.page_size.max(1) as u64)
    }

    /// Check if there's a next page.
    pub fn has_next(&self) -> bool {
        (self.page as u64) < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Sortable user columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Id,
    Email,
    Name,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Email => "email",
            Self::Name => "name",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "email" => Ok(Self::Email),
            "name" | "full_name" => Ok(Self::Name),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            other => Err(ValidationError::InvalidVariant {
                field: "sort_by",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ValidationError::InvalidVariant {
                field: "sort_order",
                value: s.to_owned(),
            }),
        }
    }
}

/// Ordering for list queries. Ties are always broken by ascending id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

/// Query parameters for list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl PaginationParams {
    pub fn parse(self) -> Result<(Pagination, Sort), ValidationError> {
        let mut errors = Vec::new();

        let pagination = match Pagination::new(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        ) {
            Ok(pagination) => pagination,
            Err(e) => {
                errors.push(e);
                Pagination::default()
            }
        };

        let mut sort = Sort::default();
        if let Some(field) = self.sort_by.as_deref() {
            match field.parse() {
                Ok(field) => sort.field = field,
                Err(e) => errors.push(e),
            }
        }
        if let Some(order) = self.sort_order.as_deref() {
            match order.parse() {
                Ok(order) => sort.order = order,
                Err(e) => errors.push(e),
            }
        }

        match ValidationError::combine(errors) {
            Some(err) => Err(flatten(err)),
            None => Ok((pagination, sort)),
        }
    }
}

// Pagination::new may already have produced a Multiple
fn flatten(err: ValidationError) -> ValidationError {
    match err {
        ValidationError::Multiple(errors) => ValidationError::Multiple(
            errors
                .into_iter()
                .flat_map(|e| match e {
                    ValidationError::Multiple(inner) => inner,
                    single => vec![single],
                })
                .collect(),
        ),
        single => single,
    }
}
