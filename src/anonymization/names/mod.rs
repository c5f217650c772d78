//! Person name canonicalization
//!
//! Used to recognize that differently written mentions ("M. Jean Dupont",
//! "JEAN DUPONT") denote the same person.

pub mod normalizer;

pub use normalizer::{strip_diacritics, NameCanonicalizer, NameMatch, NormalizedName};
