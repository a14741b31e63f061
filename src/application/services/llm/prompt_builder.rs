//! Prompt building for illustration captions and image requests

use crate::application::ports::outbound::{ChatMessage, LlmRequest};
use crate::application::services::illustration_service::IllustrationSlot;
use crate::domain::value_objects::StoryContext;

pub const CAPTION_SYSTEM_PROMPT: &str = "You are the art director of a children's picture \
book. Describe ONE illustration for the passage you are given. Keep it gentle, colorful and \
safe for young children. Mention the main character and the setting. Reply with a single \
sentence of at most 40 words and nothing else.";

/// Token budget for a caption reply
pub const CAPTION_MAX_TOKENS: u32 = 80;

const CAPTION_TEMPERATURE: f32 = 0.7;

/// Section text beyond this many characters is not sent to the captioner
const MAX_PASSAGE_CHARS: usize = 600;

/// Captions are cut to this many characters
pub const MAX_CAPTION_CHARS: usize = 300;

const IMAGE_STYLE: &str = "Children's storybook illustration, soft watercolor style, \
bright friendly colors, no text or lettering";

/// Build the caption request for one illustration slot
pub fn build_caption_request(slot: &IllustrationSlot<'_>, story: &StoryContext) -> LlmRequest {
    let mut message = String::new();

    message.push_str(&format!("MAIN CHARACTER: {}\n", story.protagonist));
    message.push_str(&format!("SETTING: {}\n", story.setting));
    message.push_str(&format!("MISSION: {}\n\n", story.mission));

    match slot {
        IllustrationSlot::Cover => {
            message.push_str(&format!(
                "This is the COVER of the book \"{}\". Describe a cover picture that \
                 introduces the main character and hints at the adventure.",
                story.title
            ));
        }
        IllustrationSlot::Section { index, total, text } => {
            message.push_str(&format!("PASSAGE ({} of {}):\n", index, total));
            message.push_str(truncate_chars(text.trim(), MAX_PASSAGE_CHARS));
        }
    }

    LlmRequest::new(vec![ChatMessage::user(message)])
        .with_system_prompt(CAPTION_SYSTEM_PROMPT)
        .with_temperature(CAPTION_TEMPERATURE)
        .with_max_tokens(CAPTION_MAX_TOKENS)
}

/// Deterministic caption used whenever the captioner is unavailable
pub fn fallback_caption(slot: &IllustrationSlot<'_>, story: &StoryContext) -> String {
    match slot {
        IllustrationSlot::Cover => format!(
            "{} setting out on {} in {}, smiling and ready for adventure",
            story.protagonist, story.mission, story.setting
        ),
        IllustrationSlot::Section { index, total, .. } => format!(
            "{} exploring {} during part {} of {} of the story",
            story.protagonist, story.setting, index, total
        ),
    }
}

/// Reduce a model reply to a single clean caption line, if it has one
pub fn clean_caption(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches(|c| c == '"' || c == '\'' || c == '*');
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(truncate_chars(&collapsed, MAX_CAPTION_CHARS).to_string())
}

/// Turn a caption into the prompt sent to the image generator
pub fn build_image_prompt(caption: &str) -> String {
    format!("{}. {}.", caption.trim_end_matches('.'), IMAGE_STYLE)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((pos, _)) => &text[..pos],
        None => text,
    }
}
