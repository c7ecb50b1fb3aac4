/// Profile fields that count toward the completion percentage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileFields<'a> {
    pub name: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub location: Option<&'a str>,
    pub avatar_url: Option<&'a str>,
    pub skills: &'a [String],
    pub interests: &'a [String],
}

const NAME_WEIGHT: u8 = 15;
const BIO_WEIGHT: u8 = 20;
const LOCATION_WEIGHT: u8 = 15;
const AVATAR_WEIGHT: u8 = 15;
const SKILLS_WEIGHT: u8 = 20;
const INTERESTS_WEIGHT: u8 = 15;

fn text_filled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

fn list_filled(values: &[String]) -> bool {
    values.iter().any(|v| !v.trim().is_empty())
}

/// Weighted share of populated fields, 0..=100.
pub fn completion_percentage(fields: &ProfileFields<'_>) -> u8 {
    let parts = [
        (text_filled(fields.name), NAME_WEIGHT),
        (text_filled(fields.bio), BIO_WEIGHT),
        (text_filled(fields.location), LOCATION_WEIGHT),
        (text_filled(fields.avatar_url), AVATAR_WEIGHT),
        (list_filled(fields.skills), SKILLS_WEIGHT),
        (list_filled(fields.interests), INTERESTS_WEIGHT),
    ];

    parts
        .iter()
        .filter(|(filled, _)| *filled)
        .map(|(_, weight)| *weight)
        .sum()
}
