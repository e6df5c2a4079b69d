//! `get_prompt_suggestions`: dump of the configured prompt templates

use super::args::Arguments;
use super::schema;
use super::{Tool, ToolContext};
use crate::config::PromptSuggestions;
use crate::error::{Result, ToolError};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const SAMPLER_PREVIEW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    All,
    Characters,
    Styles,
    Negative,
    Quality,
    Samplers,
    SceneBackgrounds,
    ClothingAccessories,
    EnvironmentTags,
    TechnicalParameters,
}

/// Where a category's data lives in the configuration
#[derive(Debug, Clone, Copy)]
enum Section {
    Characters,
    Styles,
    Negative,
    Quality,
    /// Free-form category, shown only when configured
    Extra(&'static str),
}

const SECTIONS: [Section; 8] = [
    Section::Characters,
    Section::Styles,
    Section::Negative,
    Section::Quality,
    Section::Extra("scene_backgrounds"),
    Section::Extra("clothing_accessories"),
    Section::Extra("environment_tags"),
    Section::Extra("technical_parameters"),
];

impl Section {
    fn key(&self) -> &'static str {
        match self {
            Section::Characters => "character_prompts",
            Section::Styles => "style_modifiers",
            Section::Negative => "negative_prompts",
            Section::Quality => "quality_enhancers",
            Section::Extra(key) => *key,
        }
    }

    fn value(&self, suggestions: &PromptSuggestions) -> Option<Value> {
        let value = match self {
            Section::Characters => serde_json::to_value(&suggestions.character_prompts),
            Section::Styles => serde_json::to_value(&suggestions.style_modifiers),
            Section::Negative => serde_json::to_value(&suggestions.negative_prompts),
            Section::Quality => serde_json::to_value(&suggestions.quality_enhancers),
            Section::Extra(key) => return suggestions.extra.get(*key).cloned(),
        };
        value.ok()
    }
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::All,
        Category::Characters,
        Category::Styles,
        Category::Negative,
        Category::Quality,
        Category::Samplers,
        Category::SceneBackgrounds,
        Category::ClothingAccessories,
        Category::EnvironmentTags,
        Category::TechnicalParameters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::All => "all",
            Category::Characters => "characters",
            Category::Styles => "styles",
            Category::Negative => "negative",
            Category::Quality => "quality",
            Category::Samplers => "samplers",
            Category::SceneBackgrounds => "scene_backgrounds",
            Category::ClothingAccessories => "clothing_accessories",
            Category::EnvironmentTags => "environment_tags",
            Category::TechnicalParameters => "technical_parameters",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == name.trim())
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|c| c.as_str()).collect();
                ToolError::validation(format!(
                    "category '{name}' is not one of: {}",
                    names.join(", ")
                ))
            })
    }

    fn section(&self) -> Option<Section> {
        match self {
            Category::Characters => Some(Section::Characters),
            Category::Styles => Some(Section::Styles),
            Category::Negative => Some(Section::Negative),
            Category::Quality => Some(Section::Quality),
            Category::SceneBackgrounds => Some(Section::Extra("scene_backgrounds")),
            Category::ClothingAccessories => Some(Section::Extra("clothing_accessories")),
            Category::EnvironmentTags => Some(Section::Extra("environment_tags")),
            Category::TechnicalParameters => Some(Section::Extra("technical_parameters")),
            Category::All | Category::Samplers => None,
        }
    }
}

pub fn suggestions(prompts: &PromptSuggestions, category: Category, now: &str) -> Map<String, Value> {
    let mut out = Map::new();
    let samplers: Vec<&String> = prompts.available_samplers.iter().take(SAMPLER_PREVIEW).collect();
    out.insert("available_samplers".into(), json!(samplers));
    out.insert("current_time".into(), json!(now));

    let sections: Vec<Section> = match category {
        Category::All => SECTIONS.to_vec(),
        other => other.section().into_iter().collect(),
    };
    for section in sections {
        if let Some(value) = section.value(prompts) {
            out.insert(section.key().into(), value);
        }
    }

    if category == Category::Samplers {
        out.insert(
            "sampler_recommendations".into(),
            json!({
                "fast": ["Euler a", "Euler", "LMS"],
                "quality": ["DPM++ 2M", "DPM++ SDE", "DPM++ 2M Karras"],
                "creative": ["DDIM", "PLMS", "UniPC"],
            }),
        );
    }
    out
}

pub struct PromptSuggestionsTool {
    ctx: Arc<ToolContext>,
}

impl PromptSuggestionsTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for PromptSuggestionsTool {
    fn name(&self) -> &'static str {
        "get_prompt_suggestions"
    }

    fn description(&self) -> &'static str {
        "List the configured prompt templates, negative prompts and samplers"
    }

    fn input_schema(&self) -> Value {
        let names: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
        schema::object(
            vec![("category", schema::one_of("Which templates to show", &names, "all"))],
            &[],
        )
    }

    async fn call(&self, arguments: &Map<String, Value>) -> Result<String> {
        let args = Arguments::new(arguments);
        let category = match args.optional_str("category")? {
            Some(name) => Category::parse(&name)?,
            None => Category::All,
        };

        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let dump = suggestions(&self.ctx.pipeline.config().prompt_suggestions, category, &now);
        // A map of JSON values always serializes
        let pretty = serde_json::to_string_pretty(&dump).unwrap_or_default();
        Ok(format!("Prompt suggestions ({}):\n{}", category.as_str(), pretty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Fragment;

    fn prompts() -> PromptSuggestions {
        let mut p = PromptSuggestions::default();
        p.character_prompts
            .insert("anime_girl".into(), Fragment::Text("1girl".into()));
        p.quality_enhancers
            .insert("high_quality".into(), Fragment::Text("masterpiece".into()));
        p.available_samplers = (0..12).map(|i| format!("s{i}")).collect();
        p.extra
            .insert("scene_backgrounds".into(), json!({"forest": "forest, trees"}));
        p
    }

    #[test]
    fn test_all_includes_configured_sections() {
        let out = suggestions(&prompts(), Category::All, "2026-01-01 00:00:00");
        assert_eq!(out["available_samplers"].as_array().unwrap().len(), 10);
        assert_eq!(out["current_time"], "2026-01-01 00:00:00");
        assert_eq!(out["character_prompts"]["anime_girl"], "1girl");
        assert!(out.contains_key("scene_backgrounds"));
        assert!(!out.contains_key("environment_tags"));
        assert!(!out.contains_key("sampler_recommendations"));
    }

    #[test]
    fn test_single_category() {
        let out = suggestions(&prompts(), Category::Quality, "t");
        assert!(out.contains_key("quality_enhancers"));
        assert!(!out.contains_key("character_prompts"));

        let out = suggestions(&prompts(), Category::Samplers, "t");
        assert_eq!(out["sampler_recommendations"]["fast"][0], "Euler a");
        assert!(!out.contains_key("quality_enhancers"));
    }

    #[test]
    fn test_unknown_category() {
        assert!(matches!(Category::parse("poses"), Err(ToolError::Validation(_))));
        assert_eq!(Category::parse("environment_tags").unwrap(), Category::EnvironmentTags);
    }
}
