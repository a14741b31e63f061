//! Placeholder color schemes
//!
//! Placeholder artwork picks its colors from a fixed table keyed by section
//! index, so the same section always looks the same.

/// Colors used to paint one placeholder scene (hex `#rrggbb`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderScheme {
    pub name: &'static str,
    pub gradient_start: &'static str,
    pub gradient_end: &'static str,
    pub badge: &'static str,
    pub text: &'static str,
}

pub const PALETTE: [PlaceholderScheme; 6] = [
    PlaceholderScheme {
        name: "sunrise",
        gradient_start: "#ffd194",
        gradient_end: "#ff8a80",
        badge: "#fff3e0",
        text: "#5d4037",
    },
    PlaceholderScheme {
        name: "lagoon",
        gradient_start: "#a1ffce",
        gradient_end: "#4fc3f7",
        badge: "#e0f7fa",
        text: "#01579b",
    },
    PlaceholderScheme {
        name: "meadow",
        gradient_start: "#d4fc79",
        gradient_end: "#66bb6a",
        badge: "#f1f8e9",
        text: "#1b5e20",
    },
    PlaceholderScheme {
        name: "twilight",
        gradient_start: "#b39ddb",
        gradient_end: "#5c6bc0",
        badge: "#ede7f6",
        text: "#ffffff",
    },
    PlaceholderScheme {
        name: "candy",
        gradient_start: "#fbc2eb",
        gradient_end: "#f06292",
        badge: "#fce4ec",
        text: "#880e4f",
    },
    PlaceholderScheme {
        name: "sandcastle",
        gradient_start: "#fff59d",
        gradient_end: "#ffb74d",
        badge: "#fffde7",
        text: "#e65100",
    },
];

/// Scheme for a section index (0 is the cover)
pub fn scheme_for(section_index: usize) -> &'static PlaceholderScheme {
    &PALETTE[section_index % PALETTE.len()]
}
