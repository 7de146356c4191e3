use serde_json::{json, Value};
use tryon_contracts::pose::Pose;
use tryon_contracts::recommendation::Recommendation;

pub fn composite_instruction(pose: &Pose, instructions: &str) -> String {
    let mut lines = vec![
        "The first image is a photo of a person. The second image is a garment.".to_string(),
        "Produce a photorealistic photo of this exact person wearing the garment.".to_string(),
        "Preserve the person's identity, face, hair, body shape, skin tone, background and lighting exactly."
            .to_string(),
        "Replace the clothing they are wearing in that area with the garment, fitted naturally with realistic drape, folds and shadows."
            .to_string(),
        pose.directive(),
    ];
    let extra = instructions.trim();
    if !extra.is_empty() {
        lines.push(format!("Additional instructions: {extra}"));
    }
    lines.push("Return only the image. Do not include any text in the response.".to_string());
    lines.join("\n")
}

pub fn style_review_instruction() -> &'static str {
    "You are a friendly personal stylist. The first image is a person and the second is a garment they are trying on. \
     In two or three sentences, give a positive, specific comment on how the garment suits them: fit, color harmony with \
     their features, and how it works with their overall look. Plain text only."
}

pub fn recommendations_instruction() -> &'static str {
    "You are a fashion stylist. Suggest complementary items that would complete an outfit built around this garment \
     (for example shoes, bottoms, outerwear, accessories). Return a JSON array; each element has itemName, category, \
     reason (one sentence) and color (a representative hex color such as #1F3A5F)."
}

pub fn product_image_instruction(recommendation: &Recommendation) -> String {
    format!(
        "Professional studio product photograph of a {color} {name} ({category}). \
         Front-facing, centered, isolated on a pure white background, soft even studio lighting, \
         no model, no mannequin, no text or logos.",
        color = recommendation.color,
        name = recommendation.item_name,
        category = recommendation.category,
    )
}

pub fn safety_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "valid": { "type": "BOOLEAN" },
            "reason": { "type": "STRING" }
        },
        "required": ["valid"]
    })
}

pub fn recommendations_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "itemName": { "type": "STRING" },
                "category": { "type": "STRING" },
                "reason": { "type": "STRING" },
                "color": { "type": "STRING" }
            },
            "required": ["itemName", "category", "reason", "color"]
        }
    })
}
