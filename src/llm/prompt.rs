/// Builds the edit instruction sent alongside the photo. The constraints pin
/// everything except the hair.
pub fn build_edit_instruction(style_name: &str, style_description: &str) -> String {
    let style_name = style_name.trim();
    let style_description = style_description.trim().trim_end_matches('.');

    format!(
        "Instructions: Replace the person's hair with a {style_name}.\n\
         Style details: {style_description}.\n\
         \n\
         Strict Constraints:\n\
         1. Edit ONLY the hair. Leave every other part of the image untouched.\n\
         2. RETAIN the person's exact face, identity, facial features, skin tone, and expression.\n\
         3. RETAIN the original background and lighting.\n\
         4. The result must be photorealistic and seamlessly blended.\n\
         5. Do not add accessories (glasses, hats) unless the style implies it."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_names_style_and_preservation_constraints() {
        let prompt = build_edit_instruction("Buzz Cut", "Very short all over.");
        assert!(prompt.contains("hair with a Buzz Cut."));
        assert!(prompt.contains("Style details: Very short all over.\n"));
        for needle in [
            "ONLY the hair",
            "identity",
            "facial features",
            "skin tone",
            "expression",
            "background",
            "lighting",
        ] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
    }
}
