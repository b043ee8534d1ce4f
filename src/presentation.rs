//! Presentation-side helpers shared by front ends: progress copy, file naming
//! and operator help. Nothing here touches workflow state.

use std::time::Duration;

use crate::llm::ErrorKind;

pub const TIP_ROTATION_INTERVAL: Duration = Duration::from_millis(2500);
pub const API_KEY_URL: &str = "https://aistudio.google.com/app/apikey";

pub fn loading_tips(style_name: &str) -> Vec<String> {
    vec![
        "Analyzing facial structure...".to_string(),
        format!("Applying {style_name} to your photo..."),
        "Blending hair naturally with lighting...".to_string(),
        "Refining texture and details...".to_string(),
        "Finalizing your new look...".to_string(),
    ]
}

pub fn download_file_name(style_name: &str) -> String {
    let slug: String = style_name
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_whitespace() { '-' } else { ch })
        .collect();
    format!("barber-ai-{slug}.png")
}

/// Extra guidance for failures the user cannot fix by retrying.
pub fn error_help(kind: ErrorKind) -> Option<Vec<String>> {
    match kind {
        ErrorKind::MissingCredential => Some(vec![
            format!("Get a Gemini API key at {API_KEY_URL}"),
            "Set GEMINI_API_KEY in the environment or in a .env file next to the binary.".to_string(),
            "Restart barber-ai so the new key is picked up.".to_string(),
        ]),
        ErrorKind::NoCandidates | ErrorKind::ModelRefusal => Some(vec![
            "Try a clearer, front-facing photo or a different hairstyle.".to_string(),
        ]),
        ErrorKind::Upstream | ErrorKind::EmptyResponse => None,
    }
}
