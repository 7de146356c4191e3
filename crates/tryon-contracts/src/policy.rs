/// Garment categories the safety gate always rejects.
pub const DISALLOWED_CATEGORIES: &[&str] = &[
    "intimate apparel (lingerie, underwear, bras)",
    "swimwear (bikinis, swimsuits, swim trunks)",
    "hate symbols or extremist insignia",
    "nudity or sexually explicit content",
    "weapons or weapon accessories",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyPolicy {
    pub disallowed: Vec<String>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            disallowed: DISALLOWED_CATEGORIES
                .iter()
                .map(|item| (*item).to_string())
                .collect(),
        }
    }
}

impl SafetyPolicy {
    pub fn instruction(&self) -> String {
        let mut lines = vec![
            "You are a content moderator for a virtual fitting room.".to_string(),
            "Decide whether the image shows a clothing item or fashion accessory that may be tried on."
                .to_string(),
            "Mark it invalid if it is not clothing or an accessory, or if it falls into any of these categories:"
                .to_string(),
        ];
        for category in &self.disallowed {
            lines.push(format!("- {category}"));
        }
        lines.push(
            "Respond with JSON {\"valid\": boolean, \"reason\": string}. When invalid, the reason is one short sentence the shopper will read."
                .to_string(),
        );
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::SafetyPolicy;

    #[test]
    fn instruction_lists_every_category() {
        let policy = SafetyPolicy::default();
        let text = policy.instruction();
        for category in &policy.disallowed {
            assert!(text.contains(category.as_str()));
        }
        assert!(text.contains("swimwear"));
        assert!(text.contains("\"valid\": boolean"));
    }
}
