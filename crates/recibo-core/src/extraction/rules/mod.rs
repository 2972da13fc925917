//! Field shapes, normalization and validation rules.

pub mod amounts;
pub mod dates;
pub mod issuer;
pub mod patterns;
pub mod quality;
pub mod tax_id;

pub use amounts::{amounts_match, parse_amount, within_one_percent};
pub use dates::{format_date, normalize_date, normalize_date_with_year};
pub use issuer::guess_issuer;
pub use patterns::{shape_pattern, shape_regex};
pub use quality::{TextQuality, assess_text_quality};
pub use tax_id::{is_tax_id_shape, normalize_tax_id, validate_tax_id};
