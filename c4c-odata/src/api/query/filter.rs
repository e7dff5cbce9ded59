//! `$filter` expression builder
//!
//! The builder is a plain text accumulator split into phases. Each phase is its
//! own type and only exposes the calls that are legal at that point:
//!
//! - [`FilterField`]: name the field being compared
//! - [`FilterExpr`]: pick the comparison operator and value
//! - [`FilterAndOr`]: combine with another clause
//!
//! Every call consumes the current phase and hands the same buffer on to the
//! next one, so a half-built filter can never be observed from two places.
//! Field names, values and operator arity are not validated or escaped.
//!
//! ```
//! use c4c_odata::api::query::new_filter;
//!
//! let filter = new_filter()
//!     .field("LifeCycleStatusCode")
//!     .eq("'2'")
//!     .and()
//!     .field("RoleCode")
//!     .eq("'CRM000'");
//!
//! assert_eq!(filter.to_string(), "LifeCycleStatusCode eq '2' and RoleCode eq 'CRM000'");
//! ```

use std::fmt;

/// Start a new filter at the field phase
pub fn new_filter() -> FilterField {
    ODataFilter::new_builder()
}

/// Accumulated filter text
///
/// This is also the terminal phase returned by [`FilterExpr::ge`],
/// [`FilterExpr::le`] and [`FilterExpr::lt`]: it can be rendered but not
/// extended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ODataFilter {
    filter_str: String,
}

impl ODataFilter {
    pub fn new_builder() -> FilterField {
        FilterField {
            filter: Self::default(),
        }
    }

    /// Rendered filter text
    pub fn build(&self) -> String {
        self.filter_str.clone()
    }

    pub fn as_str(&self) -> &str {
        &self.filter_str
    }

    pub fn is_empty(&self) -> bool {
        self.filter_str.is_empty()
    }

    fn push_field(&mut self, name: &str) {
        self.filter_str.push_str(name);
    }

    fn push_op(&mut self, op: &str, value: &dyn fmt::Display) {
        self.filter_str.push_str(&format!(" {} {}", op, value));
    }

    fn combine(&mut self, op: &str, other: Option<String>) {
        match other {
            Some(other) if !other.is_empty() => {
                self.filter_str = format!("({}) {} ({})", self.filter_str, op, other);
            }
            _ => {
                self.filter_str.push(' ');
                self.filter_str.push_str(op);
                self.filter_str.push(' ');
            }
        }
    }
}

impl fmt::Display for ODataFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filter_str)
    }
}

/// Field phase: only [`FilterField::field`] is available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterField {
    filter: ODataFilter,
}

impl FilterField {
    /// Append a field name verbatim
    pub fn field(mut self, name: impl AsRef<str>) -> FilterExpr {
        self.filter.push_field(name.as_ref());
        FilterExpr {
            filter: self.filter,
        }
    }

    pub fn build(&self) -> String {
        self.filter.build()
    }

    pub fn into_filter(self) -> ODataFilter {
        self.filter
    }
}

/// Operator phase: exactly one comparison is expected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpr {
    filter: ODataFilter,
}

impl FilterExpr {
    /// `field eq value`, chaining continues with `and`/`or`
    pub fn eq(mut self, value: impl fmt::Display) -> FilterAndOr {
        self.filter.push_op("eq", &value);
        FilterAndOr {
            filter: self.filter,
        }
    }

    /// `field ge value`, completes the expression
    pub fn ge(mut self, value: impl fmt::Display) -> ODataFilter {
        self.filter.push_op("ge", &value);
        self.filter
    }

    /// `field le value`, completes the expression
    pub fn le(mut self, value: impl fmt::Display) -> ODataFilter {
        self.filter.push_op("le", &value);
        self.filter
    }

    /// `field lt value`, completes the expression
    pub fn lt(mut self, value: impl fmt::Display) -> ODataFilter {
        self.filter.push_op("lt", &value);
        self.filter
    }

    pub fn build(&self) -> String {
        self.filter.build()
    }

    pub fn into_filter(self) -> ODataFilter {
        self.filter
    }
}

/// Combination phase
///
/// The `*_group` variants wrap both sides in parentheses. The bare variants
/// only append the keyword and expect the right operand to be built inline,
/// which yields an unparenthesised left-to-right chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterAndOr {
    filter: ODataFilter,
}

impl FilterAndOr {
    /// Append a bare ` and `
    pub fn and(mut self) -> FilterField {
        self.filter.combine("and", None);
        FilterField {
            filter: self.filter,
        }
    }

    /// Append a bare ` or `
    pub fn or(mut self) -> FilterField {
        self.filter.combine("or", None);
        FilterField {
            filter: self.filter,
        }
    }

    /// `(current) and (other)`; an empty `other` falls back to [`FilterAndOr::and`]
    pub fn and_group(mut self, other: impl fmt::Display) -> FilterField {
        self.filter.combine("and", Some(other.to_string()));
        FilterField {
            filter: self.filter,
        }
    }

    /// `(current) or (other)`; an empty `other` falls back to [`FilterAndOr::or`]
    pub fn or_group(mut self, other: impl fmt::Display) -> FilterField {
        self.filter.combine("or", Some(other.to_string()));
        FilterField {
            filter: self.filter,
        }
    }

    pub fn build(&self) -> String {
        self.filter.build()
    }

    pub fn into_filter(self) -> ODataFilter {
        self.filter
    }
}

macro_rules! impl_filter_phase {
    ($($phase:ty),*) => {
        $(
            impl fmt::Display for $phase {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::Display::fmt(&self.filter, f)
                }
            }

            impl From<$phase> for ODataFilter {
                fn from(phase: $phase) -> Self {
                    phase.filter
                }
            }
        )*
    };
}

impl_filter_phase!(FilterField, FilterExpr, FilterAndOr);
