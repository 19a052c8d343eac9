pub mod journal_patterns;
pub mod knowledge;
