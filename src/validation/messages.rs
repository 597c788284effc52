//! User-facing wording for raw constraint messages

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

type Formatter = fn(&Captures<'_>, &str) -> String;

const REQUIRED: &str = "This field is required";

/// Known raw templates and how to reword them. First match wins.
static TEMPLATES: Lazy<Vec<(Regex, Formatter)>> = Lazy::new(|| {
    let table: [(&str, Formatter); 15] = [
        (r"^Required$", |_, _| REQUIRED.to_string()),
        (r"^String must contain at least (\d+) character\(s\)$", |c, _| {
            match &c[1] {
                "1" => REQUIRED.to_string(),
                n => format!("Must be at least {n} characters"),
            }
        }),
        (r"^String must contain at most (\d+) character\(s\)$", |c, _| {
            format!("Must be at most {} characters", &c[1])
        }),
        (r"^Array must contain at least (\d+) element\(s\)$", |c, _| {
            match &c[1] {
                "1" => "Select at least one item".to_string(),
                n => format!("Select at least {n} items"),
            }
        }),
        (r"^Array must contain at most (\d+) element\(s\)$", |c, _| {
            format!("Select at most {} items", &c[1])
        }),
        (r"^Number must be greater than or equal to (\S+)$", |c, _| {
            format!("Must be at least {}", &c[1])
        }),
        (r"^Number must be greater than (\S+)$", |c, _| match &c[1] {
            "0" => "Must be a positive number".to_string(),
            n => format!("Must be greater than {n}"),
        }),
        (r"^Number must be less than or equal to (\S+)$", |c, _| {
            format!("Must be at most {}", &c[1])
        }),
        (r"^Number must be less than (\S+)$", |c, _| {
            format!("Must be less than {}", &c[1])
        }),
        (r"^Expected \S+, received (?:null|undefined)$", |_, _| {
            REQUIRED.to_string()
        }),
        (r"^Expected (?:number|integer), received \w+$", |_, field| {
            format!("{} must be a number", field_label(field))
        }),
        (r"^Expected string, received \w+$", |_, field| {
            format!("{} must be text", field_label(field))
        }),
        (r"^Invalid email$", |_, _| {
            "Please enter a valid email address".to_string()
        }),
        (r"^Invalid url$", |_, _| "Please enter a valid URL".to_string()),
        (r"^Invalid enum value", |_, _| {
            "Please select a valid option".to_string()
        }),
    ];

    table
        .into_iter()
        .filter_map(|(pattern, formatter)| match Regex::new(pattern) {
            Ok(re) => Some((re, formatter)),
            Err(e) => {
                tracing::error!(pattern, error = %e, "Invalid message template");
                None
            }
        })
        .collect()
});

/// Map a raw constraint message to the wording shown next to `field`.
/// Messages that match no known template are returned unchanged.
pub fn format_error_message(field: &str, raw_message: &str) -> String {
    TEMPLATES
        .iter()
        .find_map(|(re, formatter)| re.captures(raw_message).map(|c| formatter(&c, field)))
        .unwrap_or_else(|| raw_message.to_string())
}

/// Human label for the last segment of a dotted field path:
/// `details.buildingAge` → `Building age`, `floor_area` → `Floor area`
fn field_label(field: &str) -> String {
    let name = field.rsplit('.').next().unwrap_or(field);
    if name.is_empty() {
        return "This field".to_string();
    }

    let mut words = String::new();
    for (i, ch) in name.chars().enumerate() {
        if ch == '_' || ch == '-' {
            words.push(' ');
        } else if ch.is_uppercase() && i > 0 {
            words.push(' ');
            words.extend(ch.to_lowercase());
        } else if i == 0 {
            words.extend(ch.to_uppercase());
        } else {
            words.push(ch);
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_length_one_reads_as_required() {
        assert_eq!(
            format_error_message("title", "String must contain at least 1 character(s)"),
            "This field is required"
        );
        assert_eq!(
            format_error_message("title", "String must contain at least 10 character(s)"),
            "Must be at least 10 characters"
        );
    }

    #[test]
    fn test_numeric_bounds() {
        assert_eq!(
            format_error_message("price", "Number must be greater than 0"),
            "Must be a positive number"
        );
        assert_eq!(
            format_error_message("latitude", "Number must be greater than or equal to -90"),
            "Must be at least -90"
        );
        assert_eq!(
            format_error_message("latitude", "Number must be less than or equal to 90"),
            "Must be at most 90"
        );
    }

    #[test]
    fn test_type_messages_use_field_label() {
        assert_eq!(
            format_error_message("details.buildingAge", "Expected integer, received string"),
            "Building age must be a number"
        );
        assert_eq!(
            format_error_message("price", "Expected number, received null"),
            "This field is required"
        );
        assert_eq!(
            format_error_message("meta_title", "Expected string, received number"),
            "Meta title must be text"
        );
    }

    #[test]
    fn test_misc_templates() {
        assert_eq!(format_error_message("x", "Required"), "This field is required");
        assert_eq!(
            format_error_message("email", "Invalid email"),
            "Please enter a valid email address"
        );
        assert_eq!(
            format_error_message("images", "Array must contain at least 1 element(s)"),
            "Select at least one item"
        );
        assert_eq!(
            format_error_message("type", "Invalid enum value"),
            "Please select a valid option"
        );
    }

    #[test]
    fn test_unknown_message_passes_through() {
        let raw = "Adding at least one photo is recommended";
        assert_eq!(format_error_message("images", raw), raw);
    }

    #[test]
    fn test_field_label() {
        assert_eq!(field_label("price"), "Price");
        assert_eq!(field_label("address.postalCode"), "Postal code");
        assert_eq!(field_label("floor_area"), "Floor area");
        assert_eq!(field_label(""), "This field");
    }
}
