//! Rust types used for EDM primitive property types
//!
//! Date values stay in their wire form (`/Date(ms)/` in v2, ISO 8601 in v4).

pub type String = std::string::String;
pub type Guid = std::string::String;
pub type DateTime = std::string::String;
pub type DateTimeOffset = std::string::String;
pub type Boolean = bool;
pub type Decimal = f64;
/// base64 encoded
pub type Binary = std::string::String;
