use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A complementary item suggested by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub item_name: String,
    pub category: String,
    pub reason: String,
    /// `#RRGGBB`, upper case.
    pub color: String,
}

impl Recommendation {
    /// Builds a recommendation from one element of the backend's JSON array.
    ///
    /// Returns `None` when the name or category is missing or the color is
    /// not a hex triple.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| object.get(*key).and_then(Value::as_str))
                .map(|value| value.split_whitespace().collect::<Vec<&str>>().join(" "))
                .filter(|value| !value.is_empty())
        };
        let item_name = text(&["itemName", "item_name", "name"])?;
        let category = text(&["category"])?;
        let reason = text(&["reason", "rationale"]).unwrap_or_default();
        let color = normalize_hex_color(&text(&["color", "hex"])?)?;
        Some(Self {
            item_name,
            category,
            reason,
            color,
        })
    }

    /// Instructions seeded into the next cycle after this item becomes the garment.
    pub fn seed_instructions(&self) -> String {
        format!(
            "Wearing the recommended {} {} ({}).",
            self.color, self.item_name, self.category
        )
    }
}

pub fn normalize_hex_color(value: &str) -> Option<String> {
    let raw = value.trim();
    if !raw.starts_with('#') {
        return None;
    }
    let mut body = raw.trim_start_matches('#').to_string();
    if body.len() == 3 && body.chars().all(|ch| ch.is_ascii_hexdigit()) {
        body = body.chars().flat_map(|ch| [ch, ch]).collect::<String>();
    }
    if body.len() != 6 || !body.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", body.to_ascii_uppercase()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{normalize_hex_color, Recommendation};

    #[test]
    fn hex_colors_normalize() {
        assert_eq!(normalize_hex_color("#abc").as_deref(), Some("#AABBCC"));
        assert_eq!(normalize_hex_color(" #1a2B3c ").as_deref(), Some("#1A2B3C"));
        assert_eq!(normalize_hex_color("1a2b3c"), None);
        assert_eq!(normalize_hex_color("#12345"), None);
        assert_eq!(normalize_hex_color("#GGGGGG"), None);
    }

    #[test]
    fn from_value_reads_schema_fields() {
        let rec = Recommendation::from_value(&json!({
            "itemName": "Leather  Loafers",
            "category": "Shoes",
            "reason": "Grounds the outfit.",
            "color": "#5c4033",
        }))
        .unwrap();
        assert_eq!(rec.item_name, "Leather Loafers");
        assert_eq!(rec.color, "#5C4033");
    }

    #[test]
    fn from_value_skips_incomplete_items() {
        assert!(Recommendation::from_value(&json!({"category": "Hat", "color": "#000"})).is_none());
        assert!(Recommendation::from_value(&json!({
            "itemName": "Scarf",
            "category": "Accessory",
            "color": "navy",
        }))
        .is_none());
        assert!(Recommendation::from_value(&json!("Scarf")).is_none());
    }

    #[test]
    fn seed_instructions_mention_color_and_name() {
        let rec = Recommendation {
            item_name: "Denim Jacket".to_string(),
            category: "Outerwear".to_string(),
            reason: String::new(),
            color: "#1F3A5F".to_string(),
        };
        let text = rec.seed_instructions();
        assert!(text.contains("#1F3A5F"));
        assert!(text.contains("Denim Jacket"));
    }
}
