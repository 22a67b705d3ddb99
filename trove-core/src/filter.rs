//! Typed query filters and their defaulting rules.
//!
//! Raw request parameters arrive as optional strings ([`FilterParams`]) and
//! are converted once into a [`QueryFilter`]. After conversion there is no
//! "empty string vs absent" ambiguity left: blank keywords and extensions
//! become `None`, blank list entries are dropped, and malformed numbers fall
//! back to their defaults instead of failing the request.

use std::convert::Infallible;
use std::str::FromStr;


use crate::media_type::normalize_extension;

/// Page size used when `limit` is absent or malformed.
pub const DEFAULT_LIMIT: usize = 100;
/// Offset used when `offset` is absent or malformed.
pub const DEFAULT_OFFSET: usize = 0;

/// Ordering applied to the filtered item set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderBy {
    /// Uniform random permutation.
    #[default]
    Random,
    NameAsc,
    NameDesc,
    CreatedAsc,
    CreatedDesc,
    ModifiedAsc,
    ModifiedDesc,
    SizeAsc,
    SizeDesc,
}

impl OrderBy {
    /// Parses an `orderBy` value. Unset or unrecognized values mean random.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.map(|value| match value.trim().to_lowercase().as_str() {
            "name" | "name_asc" => OrderBy::NameAsc,
            "name_desc" => OrderBy::NameDesc,
            "created" | "created_asc" => OrderBy::CreatedAsc,
            "created_desc" => OrderBy::CreatedDesc,
            "modified" | "modified_asc" => OrderBy::ModifiedAsc,
            "modified_desc" => OrderBy::ModifiedDesc,
            "size" | "size_asc" => OrderBy::SizeAsc,
            "size_desc" => OrderBy::SizeDesc,
            _ => OrderBy::Random,
        })
        .unwrap_or_default()
    }

    /// Canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderBy::Random => "random",
            OrderBy::NameAsc => "name_asc",
            OrderBy::NameDesc => "name_desc",
            OrderBy::CreatedAsc => "created_asc",
            OrderBy::CreatedDesc => "created_desc",
            OrderBy::ModifiedAsc => "modified_asc",
            OrderBy::ModifiedDesc => "modified_desc",
            OrderBy::SizeAsc => "size_asc",
            OrderBy::SizeDesc => "size_desc",
        }
    }
}

impl FromStr for OrderBy {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(Some(s)))
    }
}

impl std::fmt::Display for OrderBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped constraints on the item set.
///
/// - `keyword`: case-insensitive substring of name, any tag, or the metadata blob.
/// - `extension`: normalized (`.png`) exact match.
/// - `tags`: every listed tag must be present (AND). Empty means no constraint.
/// - `folders`: at least one listed folder must be present (OR). Empty means
///   no constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    pub keyword: Option<String>,
    pub extension: Option<String>,
    pub tags: Vec<String>,
    pub folders: Vec<String>,
    pub order_by: OrderBy,
    pub limit: usize,
    pub offset: usize,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            keyword: None,
            extension: None,
            tags: Vec::new(),
            folders: Vec::new(),
            order_by: OrderBy::Random,
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
        }
    }
}

impl QueryFilter {
    /// Filter with no constraints and default pagination.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keyword = non_blank(Some(keyword));
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = non_blank(Some(extension)).map(|ext| normalize_extension(&ext));
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = clean_list(tags);
        self
    }

    pub fn with_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.folders = clean_list(folders);
        self
    }

    pub fn ordered_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn paginated(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Raw query-string parameters shared by `/getList`, `/getRandom` and
/// `/getRandomMedia`.
#[derive(Debug, Clone, Default)]
pub struct FilterParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    /// `orderBy`, or `order_by`.
    pub order_by: Option<String>,
    pub keyword: Option<String>,
    pub ext: Option<String>,
    /// Comma separated.
    pub tags: Option<String>,
    /// Comma separated.
    pub folders: Option<String>,
}

impl FilterParams {
    /// Collects parameters from decoded query pairs. A repeated key keeps its
    /// last value and unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "limit" => &mut params.limit,
                "offset" => &mut params.offset,
                "orderBy" | "order_by" => &mut params.order_by,
                "keyword" => &mut params.keyword,
                "ext" => &mut params.ext,
                "tags" => &mut params.tags,
                "folders" => &mut params.folders,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }

    /// Converts raw parameters, applying `default_limit` for a missing or
    /// malformed `limit`.
    pub fn into_filter(self, default_limit: usize) -> QueryFilter {
        QueryFilter {
            keyword: non_blank(self.keyword.as_deref()),
            extension: non_blank(self.ext.as_deref()).map(|ext| normalize_extension(&ext)),
            tags: split_list(self.tags.as_deref()),
            folders: split_list(self.folders.as_deref()),
            order_by: OrderBy::parse(self.order_by.as_deref()),
            limit: parse_count(self.limit.as_deref(), default_limit),
            offset: parse_count(self.offset.as_deref(), DEFAULT_OFFSET),
        }
    }
}

impl From<FilterParams> for QueryFilter {
    fn from(params: FilterParams) -> Self {
        params.into_filter(DEFAULT_LIMIT)
    }
}

/// Parses a non-negative integer, falling back to `default` for anything else.
pub fn parse_count(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| clean_list(value.split(',')))
        .unwrap_or_default()
}

fn clean_list<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|value| non_blank(Some(value.as_ref())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> FilterParams {
        FilterParams::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_order_by_aliases() {
        assert_eq!(OrderBy::parse(Some("name")), OrderBy::NameAsc);
        assert_eq!(OrderBy::parse(Some("name_asc")), OrderBy::NameAsc);
        assert_eq!(OrderBy::parse(Some("NAME_DESC")), OrderBy::NameDesc);
        assert_eq!(OrderBy::parse(Some("created")), OrderBy::CreatedAsc);
        assert_eq!(OrderBy::parse(Some("created_desc")), OrderBy::CreatedDesc);
        assert_eq!(OrderBy::parse(Some("modified")), OrderBy::ModifiedAsc);
        assert_eq!(OrderBy::parse(Some("modified_desc")), OrderBy::ModifiedDesc);
        assert_eq!(OrderBy::parse(Some("size")), OrderBy::SizeAsc);
        assert_eq!(OrderBy::parse(Some("size_desc")), OrderBy::SizeDesc);
    }

    #[test]
    fn test_order_by_falls_back_to_random() {
        assert_eq!(OrderBy::parse(None), OrderBy::Random);
        assert_eq!(OrderBy::parse(Some("random")), OrderBy::Random);
        assert_eq!(OrderBy::parse(Some("by_vibes")), OrderBy::Random);
        assert_eq!("".parse::<OrderBy>().unwrap(), OrderBy::Random);
    }

    #[test]
    fn test_defaults_when_params_absent() {
        let filter = QueryFilter::from(FilterParams::default());
        assert_eq!(filter, QueryFilter::default());
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 0);
    }

    #[test]
    fn test_malformed_numbers_fall_back_silently() {
        let filter = QueryFilter::from(params(&[("limit", "ten"), ("offset", "-3")]));
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 0);

        let filter = QueryFilter::from(params(&[("limit", "2.5"), ("offset", "")]));
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 0);

        let filter = QueryFilter::from(params(&[("limit", " 7 "), ("offset", "95")]));
        assert_eq!(filter.limit, 7);
        assert_eq!(filter.offset, 95);
    }

    #[test]
    fn test_zero_limit_is_a_valid_value() {
        let filter = QueryFilter::from(params(&[("limit", "0")]));
        assert_eq!(filter.limit, 0);
    }

    #[test]
    fn test_lists_are_split_and_cleaned() {
        let filter = QueryFilter::from(params(&[
            ("tags", "Red, blue,,  "),
            ("folders", "Inbox"),
        ]));
        assert_eq!(filter.tags, vec!["Red", "blue"]);
        assert_eq!(filter.folders, vec!["Inbox"]);
    }

    #[test]
    fn test_blank_strings_mean_absent() {
        let filter = QueryFilter::from(params(&[
            ("keyword", "   "),
            ("ext", ""),
            ("tags", ","),
        ]));
        assert_eq!(filter, QueryFilter::default());
    }

    #[test]
    fn test_extension_is_normalized() {
        let filter = QueryFilter::from(params(&[("ext", "PNG")]));
        assert_eq!(filter.extension.as_deref(), Some(".png"));

        let filter = QueryFilter::new().with_extension(".JpG");
        assert_eq!(filter.extension.as_deref(), Some(".jpg"));
    }

    #[test]
    fn test_custom_default_limit() {
        let filter = FilterParams::default().into_filter(25);
        assert_eq!(filter.limit, 25);
    }

    #[test]
    fn test_repeated_keys_keep_the_last_value() {
        let filter = QueryFilter::from(params(&[
            ("limit", "5"),
            ("limit", "abc"),
            ("tags", "x"),
            ("tags", "y"),
            ("orderBy", "name"),
            ("order_by", "size_desc"),
        ]));
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.tags, vec!["y"]);
        assert_eq!(filter.order_by, OrderBy::SizeDesc);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let filter = QueryFilter::from(params(&[("page", "3"), ("ext", "gif")]));
        assert_eq!(filter.extension.as_deref(), Some(".gif"));
        assert_eq!(filter.limit, 100);
    }
}
