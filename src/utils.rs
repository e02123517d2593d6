use crate::parse::has_query;

/// Keeps only URLs whose original query component is non-empty.
pub fn filter_has_query(input: impl IntoIterator<Item = String>) -> impl Iterator<Item = String> {
    input.into_iter().filter(|url| has_query(url))
}
