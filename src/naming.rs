//! Identifier and case helpers shared by the generator and the emitters.

/// Strip everything except ASCII alphanumerics and `_`; prefix `_` when the
/// result starts with a digit. An empty result becomes `_`.
///
/// Applying it twice yields the same value as applying it once.
///
/// ```rust
/// use apigen::naming::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("my-api.v2"), "myapiv2");
/// assert_eq!(sanitize_identifier("3tier"), "_3tier");
/// ```
pub fn sanitize_identifier(name: &str) -> String {
    let mut s: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if s.is_empty() {
        s.push('_');
    }
    if s.starts_with(|c: char| c.is_ascii_digit()) {
        s.insert(0, '_');
    }
    s
}

/// Split an identifier into lowercase words on `_`, `-`, spaces, dots and
/// lower→upper case transitions (`userID` → `user`, `id`).
fn words(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn capitalize(w: &str) -> String {
    let mut chars = w.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// `customer_id` → `CustomerId`
pub fn to_pascal_case(s: &str) -> String {
    words(s).iter().map(|w| capitalize(w)).collect()
}

/// `CustomerId` → `customerId`
pub fn to_camel_case(s: &str) -> String {
    let mut parts = words(s).into_iter();
    match parts.next() {
        Some(first) => first + &parts.map(|w| capitalize(&w)).collect::<String>(),
        None => String::new(),
    }
}

/// `CustomerID` → `customer_id`
pub fn to_snake_case(s: &str) -> String {
    words(s).join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("typescript-azure"), "typescriptazure");
        assert_eq!(sanitize_identifier("my_api"), "my_api");
        assert_eq!(sanitize_identifier("1st api"), "_1stapi");
        assert_eq!(sanitize_identifier(""), "_");
        assert_eq!(sanitize_identifier("---"), "_");
        assert_eq!(sanitize_identifier("_9"), "_9");
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(to_pascal_case("customer_id"), "CustomerId");
        assert_eq!(to_pascal_case("firstName"), "FirstName");
        assert_eq!(to_camel_case("FirstName"), "firstName");
        assert_eq!(to_camel_case("first_name"), "firstName");
        assert_eq!(to_snake_case("CustomerID"), "customer_id");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("orderItems2"), "order_items2");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_camel_case(""), "");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(s in "[ -~]{0,40}") {
            let once = sanitize_identifier(&s);
            prop_assert_eq!(sanitize_identifier(&once), once.clone());
            prop_assert!(!once.starts_with(|c: char| c.is_ascii_digit()));
        }
    }
}
