/// Joins a host and an API path with exactly one slash between them.
pub(crate) fn urljoin(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
