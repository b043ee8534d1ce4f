use std::fmt;
use std::str::FromStr;

use crate::error::StyleNotFound;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    Unisex,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unisex => "unisex",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "unisex" | "u" => Ok(Gender::Unisex),
            other => Err(format!("Unknown gender '{other}' (expected male, female or unisex)")),
        }
    }
}

/// A hairstyle preset. `description` is spliced into the edit instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HairstyleOption {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub gender: Gender,
    pub preview_color: &'static str,
}

const fn style(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    gender: Gender,
    preview_color: &'static str,
) -> HairstyleOption {
    HairstyleOption {
        id,
        name,
        description,
        gender,
        preview_color,
    }
}

static HAIRSTYLES: &[HairstyleOption] = &[
    style(
        "buzz-cut",
        "Buzz Cut",
        "Very short hair clipped to a uniform length all over the head, clean and low maintenance",
        Gender::Male,
        "bg-slate-600",
    ),
    style(
        "low-fade",
        "Low Fade",
        "Short textured top with sides that taper gradually from skin just above the ears",
        Gender::Male,
        "bg-zinc-700",
    ),
    style(
        "undercut",
        "Undercut",
        "Longer hair on top swept back, with sharply shaved or closely clipped sides and back",
        Gender::Male,
        "bg-stone-700",
    ),
    style(
        "pompadour",
        "Pompadour",
        "Voluminous top brushed upward and back with a glossy finish and shorter tapered sides",
        Gender::Male,
        "bg-amber-800",
    ),
    style(
        "crew-cut",
        "Crew Cut",
        "Short on the sides and back with slightly longer hair on top, neatly graded toward the front",
        Gender::Male,
        "bg-neutral-600",
    ),
    style(
        "man-bun",
        "Man Bun",
        "Shoulder length hair pulled back and tied into a loose bun at the crown",
        Gender::Male,
        "bg-yellow-900",
    ),
    style(
        "pixie-cut",
        "Pixie Cut",
        "Short cropped cut with soft wispy layers and a side-swept fringe",
        Gender::Female,
        "bg-pink-700",
    ),
    style(
        "long-layers",
        "Long Layers",
        "Long hair past the shoulders with face-framing layers and soft movement",
        Gender::Female,
        "bg-rose-700",
    ),
    style(
        "blunt-bob",
        "Blunt Bob",
        "Chin length bob cut straight across with a sleek, polished finish",
        Gender::Female,
        "bg-fuchsia-800",
    ),
    style(
        "beach-waves",
        "Beach Waves",
        "Shoulder length tousled waves with a relaxed, sun-kissed texture",
        Gender::Female,
        "bg-orange-700",
    ),
    style(
        "curtain-bangs",
        "Curtain Bangs",
        "Mid length hair with a center-parted fringe that sweeps outward to frame the face",
        Gender::Female,
        "bg-purple-700",
    ),
    style(
        "shag",
        "Shag",
        "Choppy layered cut with feathered ends and lots of volume at the crown",
        Gender::Unisex,
        "bg-teal-700",
    ),
    style(
        "mullet",
        "Modern Mullet",
        "Short textured front and sides with noticeably longer length at the back",
        Gender::Unisex,
        "bg-cyan-800",
    ),
    style(
        "curly-afro",
        "Curly Afro",
        "Full rounded afro with natural tight curls and even volume all around",
        Gender::Unisex,
        "bg-emerald-800",
    ),
    style(
        "shoulder-length",
        "Shoulder Length Cut",
        "Straight hair cut evenly at the shoulders with a natural middle part",
        Gender::Unisex,
        "bg-sky-800",
    ),
];

pub fn list_styles() -> &'static [HairstyleOption] {
    HAIRSTYLES
}

pub fn find_style(id: &str) -> Option<&'static HairstyleOption> {
    HAIRSTYLES.iter().find(|style| style.id == id)
}

/// Like [`find_style`] for callers that want to report the miss.
pub fn require_style(id: &str) -> Result<&'static HairstyleOption, StyleNotFound> {
    find_style(id).ok_or_else(|| StyleNotFound(id.to_string()))
}

/// Case-insensitive substring search over name, description and gender.
/// A blank query returns the whole catalog.
pub fn search_styles(query: &str) -> Vec<&'static HairstyleOption> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return HAIRSTYLES.iter().collect();
    }

    HAIRSTYLES
        .iter()
        .filter(|style| {
            style.name.to_lowercase().contains(&query)
                || style.description.to_lowercase().contains(&query)
                || style.gender.as_str().contains(&query)
        })
        .collect()
}

pub fn styles_for_gender(gender: Gender) -> Vec<&'static HairstyleOption> {
    HAIRSTYLES
        .iter()
        .filter(|style| style.gender == gender)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn catalog_is_non_empty_with_unique_ids() {
        let styles = list_styles();
        assert!(!styles.is_empty());
        let ids: HashSet<&str> = styles.iter().map(|style| style.id).collect();
        assert_eq!(ids.len(), styles.len());
    }

    #[test]
    fn finds_buzz_cut_by_id() {
        let style = find_style("buzz-cut").unwrap();
        assert_eq!(style.name, "Buzz Cut");
        assert!(find_style("mohawk-deluxe").is_none());
        assert_eq!(
            require_style("mohawk-deluxe").unwrap_err(),
            StyleNotFound("mohawk-deluxe".to_string())
        );
    }

    #[test]
    fn blank_search_returns_catalog_in_order() {
        let all: Vec<&str> = search_styles("   ").iter().map(|style| style.id).collect();
        let expected: Vec<&str> = list_styles().iter().map(|style| style.id).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn search_matches_name_description_and_gender() {
        let by_name: Vec<&str> = search_styles("BUZZ").iter().map(|style| style.id).collect();
        assert_eq!(by_name, vec!["buzz-cut"]);

        let by_description = search_styles("fringe");
        assert!(by_description.iter().any(|style| style.id == "pixie-cut"));

        let by_gender = search_styles("unisex");
        assert!(by_gender.iter().all(|style| style.gender == Gender::Unisex
            || style.description.to_lowercase().contains("unisex")));
        assert!(!by_gender.is_empty());

        assert!(search_styles("zzz-nothing").is_empty());
    }

    #[test]
    fn gender_filter_and_parsing() {
        assert!(styles_for_gender(Gender::Female)
            .iter()
            .all(|style| style.gender == Gender::Female));
        assert_eq!("Female".parse::<Gender>().unwrap(), Gender::Female);
        assert!("other".parse::<Gender>().is_err());
    }
}
