//! Separator stripping for untrusted key fragments

/// Characters that would open a new path segment if left in a fragment
const PATH_SEPARATORS: [char; 2] = ['/', '\\'];

/// Remove every path separator from `input`.
///
/// Nothing else is filtered: dots, spaces and unicode pass through untouched.
pub fn sanitize(input: &str) -> String {
    input.chars().filter(|c| !PATH_SEPARATORS.contains(c)).collect()
}
