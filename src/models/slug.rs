/// Derive a URL-safe slug from a tour name.
///
/// The name is lowercased and every run of characters that are not ASCII
/// letters or digits collapses into a single `-`. Leading and trailing dashes
/// are dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
