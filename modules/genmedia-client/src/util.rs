/// Strip markdown code fences from a model reply.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Make a generated media URI fetchable without auth headers.
pub fn with_api_key(uri: &str, api_key: &str) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}key={api_key}")
}
