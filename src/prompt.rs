//! Prompt composition from the configured template dictionaries
//!
//! Fragments are prepended in a fixed order: mode fragment first, then the
//! style fragments, and the quality enhancer last so it ends up leftmost.

use crate::config::PromptSuggestions;
use crate::request::GenerationMode;

pub const TRANSPARENT_PROMPT: &str =
    "transparent background, alpha channel, no background, isolated object";

pub const TRANSPARENT_NEGATIVE: &str = "background, white background, black background, \
     colored background, gradient background, shadow, reflection";

/// Used when `negative_prompts.general` is not configured
pub const DEFAULT_NEGATIVE: &str = "lowres, bad anatomy, bad hands, text, error, missing fingers, \
     extra digit, fewer digits, cropped, worst quality, low quality, normal quality, \
     jpeg artifacts, signature, watermark, username, blurry";

const QUALITY_KEY: &str = "high_quality";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    #[default]
    None,
    AnimeCharacter,
    RealisticPortrait,
    FantasyArt,
    ModernStyle,
}

#[derive(Debug, Clone, Copy)]
enum Category {
    Character,
    Modifier,
    Negative,
}

/// One dictionary lookup contributed by a style
#[derive(Debug, Clone, Copy)]
struct TemplateRef {
    category: Category,
    key: &'static str,
}

const fn character(key: &'static str) -> TemplateRef {
    TemplateRef { category: Category::Character, key }
}

const fn modifier(key: &'static str) -> TemplateRef {
    TemplateRef { category: Category::Modifier, key }
}

const fn negative(key: &'static str) -> TemplateRef {
    TemplateRef { category: Category::Negative, key }
}

impl Style {
    pub const ALL: [Style; 5] = [
        Style::None,
        Style::AnimeCharacter,
        Style::RealisticPortrait,
        Style::FantasyArt,
        Style::ModernStyle,
    ];

    /// Unknown names fall back to [`Style::None`]
    pub fn parse(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(Style::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::None => "none",
            Style::AnimeCharacter => "anime_character",
            Style::RealisticPortrait => "realistic_portrait",
            Style::FantasyArt => "fantasy_art",
            Style::ModernStyle => "modern_style",
        }
    }

    /// Lookups in application order
    fn templates(&self) -> &'static [TemplateRef] {
        match self {
            Style::None => &[],
            Style::AnimeCharacter => ANIME_CHARACTER,
            Style::RealisticPortrait => REALISTIC_PORTRAIT,
            Style::FantasyArt => FANTASY_ART,
            Style::ModernStyle => MODERN_STYLE,
        }
    }
}

const ANIME_CHARACTER: &[TemplateRef] = &[
    character("anime_girl"),
    modifier("anime_style"),
    negative("anime"),
];
const REALISTIC_PORTRAIT: &[TemplateRef] = &[modifier("realistic_style"), negative("realistic")];
const FANTASY_ART: &[TemplateRef] = &[character("fantasy_character"), modifier("artistic_style")];
const MODERN_STYLE: &[TemplateRef] = &[character("modern_character")];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub prompt: String,
    pub negative_prompt: String,
}

/// `"{fragment}, {text}"`, or just the fragment when `text` is empty
fn prepend(fragment: &str, text: &str) -> String {
    if text.trim().is_empty() {
        fragment.to_string()
    } else {
        format!("{fragment}, {text}")
    }
}

/// Negative prompt used when the caller does not pass one
pub fn default_negative(suggestions: &PromptSuggestions, mode: GenerationMode) -> String {
    let key = match mode {
        GenerationMode::Transparent => "transparent",
        _ => "general",
    };
    suggestions
        .negative(key)
        .unwrap_or_else(|| DEFAULT_NEGATIVE.to_string())
}

/// Deterministic: same inputs and dictionaries give the same output
pub fn compose(
    suggestions: &PromptSuggestions,
    prompt: &str,
    negative_prompt: &str,
    style: Style,
    mode: GenerationMode,
) -> ComposedPrompt {
    let mut prompt = prompt.to_string();
    let mut negative_prompt = negative_prompt.to_string();

    if mode == GenerationMode::Transparent {
        prompt = prepend(TRANSPARENT_PROMPT, &prompt);
        negative_prompt = prepend(TRANSPARENT_NEGATIVE, &negative_prompt);
    }

    for template in style.templates() {
        let fragment = match template.category {
            Category::Character => suggestions.character(template.key),
            Category::Modifier => suggestions.style_modifier(template.key),
            Category::Negative => suggestions.negative(template.key),
        };
        let Some(fragment) = fragment else {
            tracing::debug!("No {:?} template '{}' configured", template.category, template.key);
            continue;
        };
        match template.category {
            Category::Negative => negative_prompt = prepend(&fragment, &negative_prompt),
            _ => prompt = prepend(&fragment, &prompt),
        }
    }

    if let Some(quality) = suggestions.quality(QUALITY_KEY) {
        prompt = prepend(&quality, &prompt);
    }

    ComposedPrompt {
        prompt,
        negative_prompt,
    }
}
