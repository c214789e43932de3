// PHI Redaction
// Pattern table and sequential anonymizer

pub mod anonymizer;
pub mod patterns;

pub use anonymizer::{hash_token, mask_token, Anonymizer, AnonymizerError, RedactionStrategy};
pub use patterns::{builtin_categories, builtin_patterns, phi_table};
