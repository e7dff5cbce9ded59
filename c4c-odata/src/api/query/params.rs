//! OData system query options (`$filter`, `$select`, `$top`, ...)

use std::fmt;

use super::filter::{FilterAndOr, FilterExpr, FilterField, ODataFilter};

/// Default page size applied to every new parameter set
pub const DEFAULT_TOP: u32 = 30;

/// Start a new parameter set with the default values
pub fn new_param() -> ODataQueryParam {
    ODataQueryParam::new_param()
}

/// Sort direction for `$orderby`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Response payload format requested through `$format`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Json,
    Xml,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }
}

/// Value given to `$filter`: literal text or a filter builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterParam {
    Literal(String),
    Builder(ODataFilter),
}

impl fmt::Display for FilterParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => f.write_str(s),
            Self::Builder(filter) => fmt::Display::fmt(filter, f),
        }
    }
}

impl From<&str> for FilterParam {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for FilterParam {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

impl From<ODataFilter> for FilterParam {
    fn from(filter: ODataFilter) -> Self {
        Self::Builder(filter)
    }
}

impl From<FilterField> for FilterParam {
    fn from(phase: FilterField) -> Self {
        Self::Builder(phase.into())
    }
}

impl From<FilterExpr> for FilterParam {
    fn from(phase: FilterExpr) -> Self {
        Self::Builder(phase.into())
    }
}

impl From<FilterAndOr> for FilterParam {
    fn from(phase: FilterAndOr) -> Self {
        Self::Builder(phase.into())
    }
}

/// One field name or a sequence of them, for `$select` and `$expand`
pub trait IntoFieldList {
    fn into_field_list(self) -> Vec<String>;
}

impl IntoFieldList for &str {
    fn into_field_list(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoFieldList for String {
    fn into_field_list(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoFieldList for Vec<String> {
    fn into_field_list(self) -> Vec<String> {
        self
    }
}

impl IntoFieldList for Vec<&str> {
    fn into_field_list(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoFieldList for &[&str] {
    fn into_field_list(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoFieldList for &[String] {
    fn into_field_list(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> IntoFieldList for [&str; N] {
    fn into_field_list(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

/// Query parameter set
///
/// Every setter overwrites or appends exactly one option and returns the
/// parameter set for chaining. Rendering always follows the same option order,
/// whatever order the setters were called in, and leaves out options whose
/// value is empty or zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ODataQueryParam {
    filter: Option<FilterParam>,
    format: ResponseFormat,
    orderby: Option<String>,
    search: Option<String>,
    select: Vec<String>,
    skip: u32,
    top: u32,
    expand: Vec<String>,
    inlinecount: bool,
}

impl Default for ODataQueryParam {
    fn default() -> Self {
        Self {
            filter: None,
            format: ResponseFormat::Json,
            orderby: None,
            search: None,
            select: Vec::new(),
            skip: 0,
            top: DEFAULT_TOP,
            expand: Vec::new(),
            inlinecount: false,
        }
    }
}

impl ODataQueryParam {
    pub fn new_param() -> Self {
        Self::default()
    }

    /// Set `$filter`
    pub fn filter(mut self, filter: impl Into<FilterParam>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Skip the first `skip` records
    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    /// Limit the result to `top` records
    pub fn top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    /// Append fields to `$select`
    pub fn select(mut self, fields: impl IntoFieldList) -> Self {
        self.select.extend(fields.into_field_list());
        self
    }

    /// Order descending by `field`
    pub fn orderby(self, field: impl AsRef<str>) -> Self {
        self.orderby_with(field, SortOrder::default())
    }

    pub fn orderby_with(mut self, field: impl AsRef<str>, order: SortOrder) -> Self {
        self.orderby = Some(format!("{} {}", field.as_ref(), order.as_str()));
        self
    }

    /// Result format; keep it as json unless you parse xml yourself
    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    /// Fuzzy full text search (`%value%`)
    pub fn search(self, value: impl AsRef<str>) -> Self {
        self.search_with(value, true)
    }

    pub fn search_with(mut self, value: impl AsRef<str>, fuzzy: bool) -> Self {
        let value = value.as_ref();
        self.search = Some(if fuzzy {
            format!("%{}%", value)
        } else {
            value.to_string()
        });
        self
    }

    /// Append navigation properties to `$expand`
    pub fn expand(mut self, fields: impl IntoFieldList) -> Self {
        self.expand.extend(fields.into_field_list());
        self
    }

    /// Ask the server for the total record count (`$inlinecount=allpages`)
    pub fn inlinecount(mut self, enabled: bool) -> Self {
        self.inlinecount = enabled;
        self
    }

    pub fn get_skip(&self) -> u32 {
        self.skip
    }

    pub fn get_top(&self) -> u32 {
        self.top
    }

    pub fn get_format(&self) -> ResponseFormat {
        self.format
    }

    pub fn get_select(&self) -> &[String] {
        &self.select
    }

    pub fn get_expand(&self) -> &[String] {
        &self.expand
    }

    /// Rendered query options as `(name, value)` pairs, before URL encoding
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(filter) = &self.filter {
            let rendered = filter.to_string();
            if !rendered.is_empty() {
                pairs.push(("$filter", rendered));
            }
        }
        pairs.push(("$format", self.format.as_str().to_string()));
        if let Some(orderby) = self.orderby.as_ref().filter(|s| !s.is_empty()) {
            pairs.push(("$orderby", orderby.clone()));
        }
        if let Some(search) = self.search.as_ref().filter(|s| !s.is_empty()) {
            pairs.push(("$search", search.clone()));
        }
        if !self.select.is_empty() {
            pairs.push(("$select", self.select.join(",")));
        }
        if self.skip != 0 {
            pairs.push(("$skip", self.skip.to_string()));
        }
        if self.top != 0 {
            pairs.push(("$top", self.top.to_string()));
        }
        if !self.expand.is_empty() {
            pairs.push(("$expand", self.expand.join(",")));
        }
        if self.inlinecount {
            pairs.push(("$inlinecount", "allpages".to_string()));
        }

        pairs
    }

    /// URL encoded query string, without the leading `?`
    pub fn to_query_string(&self) -> String {
        self.pairs()
            .into_iter()
            .map(|(name, value)| format!("{}={}", name, encode_value(name, &value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// List options keep their separating commas literal
fn encode_value(name: &str, value: &str) -> String {
    match name {
        "$select" | "$expand" => value
            .split(',')
            .map(|item| urlencoding::encode(item).into_owned())
            .collect::<Vec<_>>()
            .join(","),
        _ => urlencoding::encode(value).into_owned(),
    }
}

impl fmt::Display for ODataQueryParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::query::new_filter;

    #[test]
    fn test_defaults_render_format_and_top_only() {
        assert_eq!(new_param().to_string(), "$format=json&$top=30");
    }

    #[test]
    fn test_zero_top_and_skip_are_suppressed() {
        assert_eq!(new_param().top(0).skip(0).to_string(), "$format=json");
    }

    #[test]
    fn test_select_appends_in_order() {
        let params = new_param().select("a").select(vec!["b", "c"]);
        assert_eq!(params.get_select(), &["a", "b", "c"]);
        assert!(params.to_string().contains("$select=a,b,c"));
    }

    #[test]
    fn test_select_keeps_duplicates() {
        let params = new_param().select(["a", "b"]).select("a");
        assert_eq!(params.get_select(), &["a", "b", "a"]);
    }

    #[test]
    fn test_expand_appends() {
        let params = new_param()
            .expand("AccountTeam")
            .expand(vec!["Contacts".to_string()]);
        assert_eq!(
            params.to_string(),
            "$format=json&$top=30&$expand=AccountTeam,Contacts"
        );
    }

    #[test]
    fn test_orderby_defaults_to_desc_and_last_write_wins() {
        let params = new_param().orderby("CreatedOn");
        assert!(params.to_string().contains("$orderby=CreatedOn%20desc"));

        let params = params.orderby_with("Name", SortOrder::Asc);
        let rendered = params.to_string();
        assert!(rendered.contains("$orderby=Name%20asc"));
        assert!(!rendered.contains("CreatedOn"));
    }

    #[test]
    fn test_search_fuzzy_and_exact() {
        let fuzzy = new_param().search("acme");
        assert_eq!(fuzzy.pairs()[1], ("$search", "%acme%".to_string()));
        assert!(fuzzy.to_string().contains("$search=%25acme%25"));

        let exact = new_param().search_with("acme", false);
        assert!(exact.to_string().contains("$search=acme&"));
    }

    #[test]
    fn test_filter_from_builder_and_literal() {
        let params = new_param().filter(new_filter().field("x").eq(1));
        assert_eq!(
            params.to_string(),
            "$filter=x%20eq%201&$format=json&$top=30"
        );

        let params = new_param().filter("Name eq 'A'");
        assert_eq!(params.pairs()[0], ("$filter", "Name eq 'A'".to_string()));
    }

    #[test]
    fn test_empty_filter_is_suppressed() {
        let params = new_param().filter("");
        assert_eq!(params.to_string(), "$format=json&$top=30");
    }

    #[test]
    fn test_fixed_order_regardless_of_call_order() {
        let params = new_param()
            .inlinecount(true)
            .expand("Notes")
            .top(5)
            .skip(10)
            .select("Name")
            .search_with("x", false)
            .orderby_with("Name", SortOrder::Asc)
            .format(ResponseFormat::Xml)
            .filter("a eq 1");

        let names: Vec<&str> = params.pairs().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "$filter",
                "$format",
                "$orderby",
                "$search",
                "$select",
                "$skip",
                "$top",
                "$expand",
                "$inlinecount"
            ]
        );
        assert_eq!(
            params.to_string(),
            "$filter=a%20eq%201&$format=xml&$orderby=Name%20asc&$search=x&$select=Name&$skip=10&$top=5&$expand=Notes&$inlinecount=allpages"
        );
    }

    #[test]
    fn test_select_items_are_encoded_individually() {
        let params = new_param().select(["a b", "c"]);
        assert!(params.to_string().contains("$select=a%20b,c"));
    }
}
