use super::model::{Dataset, Row};
use super::schema::{FUEL_TYPE_1, FUEL_TYPE_2, SEARCH_COLUMNS};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Filter predicates
// ---------------------------------------------------------------------------

/// Case-insensitive substring search across a set of text columns.
/// An empty needle matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    pub needle: String,
    pub columns: Vec<String>,
}

impl TextFilter {
    pub fn new(needle: &str, columns: &[&str]) -> Self {
        TextFilter {
            needle: needle.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Exact, case-sensitive match of a column's textual value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalFilter {
    pub column: String,
    pub value: String,
}

impl CategoricalFilter {
    pub fn new(column: &str, value: &str) -> Self {
        CategoricalFilter {
            column: column.to_string(),
            value: value.to_string(),
        }
    }
}

/// A conjunction of an optional text search and any number of categorical
/// filters. Absent parts impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    pub search: Option<TextFilter>,
    pub filters: Vec<CategoricalFilter>,
}

impl TableQuery {
    /// The table page's query: free-text search over make/model plus the two
    /// fuel-type dropdowns. Empty strings count as absent.
    pub fn fuel_economy(
        search: Option<&str>,
        fuel_type_1: Option<&str>,
        fuel_type_2: Option<&str>,
    ) -> Self {
        fn present(s: Option<&str>) -> Option<&str> {
            s.filter(|s| !s.is_empty())
        }
        let mut query = TableQuery {
            search: present(search).map(|s| TextFilter::new(s, SEARCH_COLUMNS)),
            filters: Vec::new(),
        };
        if let Some(v) = present(fuel_type_1) {
            query.filters.push(CategoricalFilter::new(FUEL_TYPE_1, v));
        }
        if let Some(v) = present(fuel_type_2) {
            query.filters.push(CategoricalFilter::new(FUEL_TYPE_2, v));
        }
        query
    }

    pub fn is_empty(&self) -> bool {
        self.search.as_ref().map_or(true, |s| s.needle.is_empty()) && self.filters.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Indices of rows that satisfy the text filter. Null cells never match.
pub fn text_matches(
    dataset: &Dataset,
    filter: &TextFilter,
    candidates: &[usize],
) -> Result<Vec<usize>> {
    if filter.needle.is_empty() {
        return Ok(candidates.to_vec());
    }
    let cols = filter
        .columns
        .iter()
        .map(|c| dataset.column_index(c))
        .collect::<Result<Vec<_>>>()?;
    let needle = filter.needle.to_lowercase();

    let hit = |row: &Row| {
        cols.iter().any(|&i| {
            let cell = &row[i];
            !cell.is_null() && cell.to_string().to_lowercase().contains(&needle)
        })
    };
    Ok(candidates
        .iter()
        .copied()
        .filter(|&i| hit(&dataset.rows[i]))
        .collect())
}

/// Indices of rows whose column equals the filter value exactly.
pub fn category_matches(
    dataset: &Dataset,
    filter: &CategoricalFilter,
    candidates: &[usize],
) -> Result<Vec<usize>> {
    let col = dataset.column_index(&filter.column)?;
    Ok(candidates
        .iter()
        .copied()
        .filter(|&i| {
            let cell = &dataset.rows[i][col];
            !cell.is_null() && cell.to_string() == filter.value
        })
        .collect())
}

/// Return indices of rows that pass every part of the query, in row order.
///
/// Each filter narrows the result of the previous one. Column names are
/// checked even when an earlier step already produced no rows, so a typo is
/// reported instead of silently returning nothing.
pub fn filtered_indices(dataset: &Dataset, query: &TableQuery) -> Result<Vec<usize>> {
    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    if let Some(search) = &query.search {
        indices = text_matches(dataset, search, &indices)?;
    }
    for filter in &query.filters {
        indices = category_matches(dataset, filter, &indices)?;
    }
    Ok(indices)
}

/// Apply the query and copy out the surviving rows.
pub fn apply(dataset: &Dataset, query: &TableQuery) -> Result<Dataset> {
    if query.is_empty() {
        return Ok(dataset.clone());
    }
    let indices = filtered_indices(dataset, query)?;
    Ok(dataset.select(&indices))
}
