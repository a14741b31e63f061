//! Placeholder scene as SVG
//!
//! The scene is a gradient sky over rolling hills with a circular badge in
//! the middle, the protagonist's name and the slot label underneath.

use crate::application::ports::outbound::PlaceholderScene;

/// Width and height of rasterized placeholders, in pixels
pub const PLACEHOLDER_SIZE: u32 = 512;

const FONT_FAMILY: &str = "DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif";
const MAX_NAME_CHARS: usize = 24;

/// Build the SVG document for a placeholder scene
pub fn placeholder_svg(scene: &PlaceholderScene) -> String {
    let scheme = scene.scheme;
    let size = PLACEHOLDER_SIZE;
    let name: String = scene.protagonist.chars().take(MAX_NAME_CHARS).collect();

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 512 512">
  <defs>
    <linearGradient id="sky" x1="0" y1="0" x2="1" y2="1">
      <stop offset="0" stop-color="{start}"/>
      <stop offset="1" stop-color="{end}"/>
    </linearGradient>
  </defs>
  <rect width="512" height="512" fill="url(#sky)"/>
  <path d="M0 420 Q128 350 256 410 T512 395 V512 H0 Z" fill="{badge}" fill-opacity="0.45"/>
  <path d="M0 460 Q160 410 320 455 T512 450 V512 H0 Z" fill="{badge}" fill-opacity="0.7"/>
  <circle cx="256" cy="200" r="100" fill="{badge}" stroke="{text}" stroke-width="8"/>
  <text x="256" y="226" font-family="{font}" font-size="76" font-weight="bold" text-anchor="middle" fill="{text}">{badge_text}</text>
  <text x="256" y="358" font-family="{font}" font-size="38" font-weight="bold" text-anchor="middle" fill="{text}">{name}</text>
  <text x="256" y="402" font-family="{font}" font-size="26" text-anchor="middle" fill="{text}">{label}</text>
</svg>"##,
        size = size,
        start = scheme.gradient_start,
        end = scheme.gradient_end,
        badge = scheme.badge,
        text = scheme.text,
        font = FONT_FAMILY,
        badge_text = escape_xml(&scene.badge_text),
        name = escape_xml(&name),
        label = escape_xml(&scene.label),
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}
