//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Returns the display name of a brand id.
///
/// Usage in templates: `{{ product.brand_id|brand_name }}`
#[askama::filter_fn]
pub fn brand_name(id: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(brand_label(&id.to_string()))
}

/// Returns the Thai display name of a product type id.
///
/// Usage in templates: `{{ product.type_id|type_name }}`
#[askama::filter_fn]
pub fn type_name(id: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(type_label(&id.to_string()))
}

/// Display name for a brand id. Unknown ids are capitalized.
#[must_use]
pub fn brand_label(id: &str) -> String {
    match id {
        "spectra" => "Spectra".to_owned(),
        "medela" => "Medela".to_owned(),
        "elvie" => "Elvie".to_owned(),
        "haakaa" => "Haakaa".to_owned(),
        other => {
            let mut chars = other.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect())
                .unwrap_or_default()
        }
    }
}

/// Thai display name for a product type id. Unknown ids are shown as is.
#[must_use]
pub fn type_label(id: &str) -> String {
    match id {
        "electric" => "ไฟฟ้าธรรมดา",
        "hospital" => "ระดับโรงพยาบาล",
        "portable" => "พกพาได้",
        "wearable" => "แบบสวมใส่",
        "manual" => "ปั๊มด้วยมือ",
        other => other,
    }
    .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(brand_label("spectra"), "Spectra");
        assert_eq!(brand_label("lansinoh"), "Lansinoh");
        assert_eq!(brand_label(""), "");
        assert_eq!(type_label("wearable"), "แบบสวมใส่");
        assert_eq!(type_label("other"), "other");
    }
}
