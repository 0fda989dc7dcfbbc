//! LLM prompt templates
//!
//! Templates use `$name` / `${name}` placeholders. Rendering is lenient:
//! placeholders without a value are left in place and `$$` renders a single
//! `$`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(\$)|([_a-zA-Z][_a-zA-Z0-9]*)|\{([_a-zA-Z][_a-zA-Z0-9]*)\})")
        .expect("valid regex")
});

/// A named prompt with `$variable` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub template: &'static str,
    pub description: &'static str,
}

impl PromptTemplate {
    /// Substitute `vars` into the template, leaving unknown placeholders as-is
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        PLACEHOLDER_RE
            .replace_all(self.template, |caps: &Captures| {
                if caps.get(1).is_some() {
                    return "$".to_string();
                }
                let key = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
                vars.iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

// =============================================================================
// System prompts
// =============================================================================

pub static STORY_GUIDE_SYSTEM: PromptTemplate = PromptTemplate {
    name: "story_guide_system",
    description: "System prompt for the story guidance assistant",
    template: "You are a friendly and creative story guide helping to create a children's storybook.

Your role is to:
- Ask helpful questions to develop the story collaboratively
- Suggest age-appropriate plot elements, characters, and settings
- Keep stories positive, gentle, and educational
- Use simple vocabulary suitable for young children
- Encourage creativity while maintaining a safe, nurturing tone

Target age group: $target_age years old
Illustration style: $style

Guidelines:
- Stories should have clear beginnings, middles, and endings
- Characters should be relatable and have simple motivations
- Themes should focus on friendship, curiosity, kindness, or growth
- Avoid scary, violent, or complex themes
- Keep each page's text to 2-3 short sentences

Always be encouraging and build upon the user's ideas.",
};

pub static PAGE_WRITER_SYSTEM: PromptTemplate = PromptTemplate {
    name: "page_writer_system",
    description: "System prompt for writing individual page text",
    template: "You are a children's book author writing text for a storybook page.

Write in a style appropriate for $target_age year olds:
- Use simple, clear sentences
- Include gentle rhythm and occasional rhyme if natural
- Keep vocabulary age-appropriate
- Each page should have 2-3 sentences maximum
- Text should complement (not describe) the illustration

Story title: $title
Style: $style",
};

pub static ILLUSTRATION_PROMPT_SYSTEM: PromptTemplate = PromptTemplate {
    name: "illustration_prompt_system",
    description: "System prompt for generating illustration prompts",
    template: r#"You are an art director for children's book illustrations.

Create detailed illustration prompts that:
- Describe the scene visually (not the text content)
- Maintain character consistency using provided traits
- Specify the art style: $style
- Include mood, lighting, and color palette
- Emphasize child-friendly, warm, inviting imagery

Always include these safety modifiers:
- "children's book illustration"
- "friendly and approachable"
- "gentle and safe feeling"
- "warm colors" "#,
};

// =============================================================================
// Story creation
// =============================================================================

pub static STORY_START: PromptTemplate = PromptTemplate {
    name: "story_start",
    description: "Opening prompt to begin story creation",
    template: "Let's create a wonderful story together!

To get started, tell me about:
1. **Who** is the main character? (a child, an animal, a magical creature?)
2. **Where** does the story take place? (a forest, a cozy home, a magical land?)
3. **What** kind of adventure or lesson? (making friends, being brave, learning something new?)

Share as much or as little as you'd like - I'll help fill in the details!",
};

pub static STORY_DEVELOPMENT: PromptTemplate = PromptTemplate {
    name: "story_development",
    description: "Prompt to develop story details from initial input",
    template: "Based on your ideas, let me help develop the story.

What you've shared:
$user_input

Now let's think about:
- What challenge or goal does $character_name have?
- Who might they meet along the way?
- What will they learn or discover?

What sounds most exciting to you?",
};

pub static SUGGEST_PLOT_POINTS: PromptTemplate = PromptTemplate {
    name: "suggest_plot_points",
    description: "Suggest plot points for a story",
    template: "For a $page_count-page story about $summary:

Here's a suggested story structure:

**Beginning (Pages 1-$beginning_end):**
- Introduce $character_name and their world
- Show their normal life

**Middle (Pages $middle_start-$middle_end):**
- The adventure or challenge begins
- $character_name tries to solve the problem
- They might need help or learn something

**End (Pages $ending_start-$page_count):**
- The challenge is resolved
- $character_name has grown or learned
- A satisfying, happy conclusion

Would you like me to draft text for any of these pages?",
};

// =============================================================================
// Page content
// =============================================================================

pub static WRITE_PAGE_TEXT: PromptTemplate = PromptTemplate {
    name: "write_page_text",
    description: "Generate text for a specific page",
    template: "Write the text for page $page_number of $total_pages.

Story context:
- Title: $title
- Main character: $character_name - $character_description
- Setting: $setting

Previous pages:
$previous_text

This page should:
$page_purpose

Write 2-3 sentences that:
- Continue the story naturally
- Are appropriate for $target_age year olds
- Leave room for the illustration to tell part of the story

Respond with ONLY the page text, no other commentary.",
};

pub static REFINE_PAGE_TEXT: PromptTemplate = PromptTemplate {
    name: "refine_page_text",
    description: "Improve or adjust existing page text",
    template: r#"Here is the current text for page $page_number:

"$current_text"

Please $refinement_request

Keep the text to 2-3 sentences, suitable for $target_age year olds.
Respond with ONLY the revised text, no other commentary."#,
};

// =============================================================================
// Illustration
// =============================================================================

pub static GENERATE_ILLUSTRATION_PROMPT: PromptTemplate = PromptTemplate {
    name: "generate_illustration_prompt",
    description: "Create an image generation prompt from page content",
    template: r#"Create an illustration prompt for this storybook page:

Page text: "$page_text"

Character details:
$character_details

Scene requirements:
- Setting: $setting
- Mood: $mood
- Time of day: $time_of_day

Art style: $style children's book illustration

Generate a detailed prompt for the illustration. Include:
1. The specific scene composition
2. Character poses and expressions
3. Background elements
4. Color palette suggestions
5. Lighting and atmosphere

End with these required modifiers:
"children's book illustration, friendly and approachable, warm colors, gentle and safe feeling, high quality"

Respond with ONLY the illustration prompt, no other commentary."#,
};

pub static ILLUSTRATION_PROMPT_TEMPLATE: PromptTemplate = PromptTemplate {
    name: "illustration_prompt_template",
    description: "Direct template for illustration prompts (no LLM needed)",
    template: "$style children's book illustration.

$scene_description

Characters: $character_descriptions
Setting: $setting
Mood: $mood, $time_of_day lighting

children's book illustration, friendly and approachable, warm colors, gentle and safe feeling, high quality, detailed, professional illustration",
};

// =============================================================================
// Characters
// =============================================================================

pub static DEFINE_CHARACTER: PromptTemplate = PromptTemplate {
    name: "define_character",
    description: "Help define a character's details",
    template: r#"Let's create a memorable character!

You mentioned: $initial_description

To bring this character to life, let's define:

1. **Name**: What should we call them?
2. **Appearance**: What do they look like? (colors, size, distinguishing features)
3. **Personality**: Are they curious? Shy? Brave? Silly?
4. **Special trait**: What makes them unique?

For consistent illustrations, I'll also need 3-4 visual details that should appear in every picture of them (like "wears a red scarf" or "has big curious eyes").

What details would you like to add?"#,
};

pub static EXTRACT_VISUAL_TRAITS: PromptTemplate = PromptTemplate {
    name: "extract_visual_traits",
    description: "Extract visual traits from character description",
    template: r#"From this character description, extract 4-6 key visual traits for illustration consistency:

Character: $name
Description: $description

List only the visual details an illustrator needs to draw this character consistently.
Format as a simple comma-separated list.

Example: "small brown mouse, big curious eyes, pink nose, tiny red scarf, fluffy ears"

Respond with ONLY the comma-separated visual traits."#,
};

pub static EXTRACT_CHARACTERS_FROM_TEXT: PromptTemplate = PromptTemplate {
    name: "extract_characters_from_text",
    description: "Identify characters and their visual traits in story text",
    template: "Read this story text and list every character who appears in it:

$story_text

For each character write exactly one line in this format:
NAME | SHORT DESCRIPTION | comma-separated visual traits

Example:
Pip | a curious little mouse who loves exploring | small brown mouse, big round ears, tiny red scarf

If there are no characters, respond with the single word NONE.
Respond with ONLY the character lines, no other commentary.",
};

/// Every built-in template keyed by name
pub fn get_all_templates() -> BTreeMap<&'static str, &'static PromptTemplate> {
    [
        &STORY_GUIDE_SYSTEM,
        &PAGE_WRITER_SYSTEM,
        &ILLUSTRATION_PROMPT_SYSTEM,
        &STORY_START,
        &STORY_DEVELOPMENT,
        &SUGGEST_PLOT_POINTS,
        &WRITE_PAGE_TEXT,
        &REFINE_PAGE_TEXT,
        &GENERATE_ILLUSTRATION_PROMPT,
        &ILLUSTRATION_PROMPT_TEMPLATE,
        &DEFINE_CHARACTER,
        &EXTRACT_VISUAL_TRAITS,
        &EXTRACT_CHARACTERS_FROM_TEXT,
    ]
    .into_iter()
    .map(|template| (template.name, template))
    .collect()
}

/// Summarise earlier pages as `Page N: text` lines
pub fn format_previous_pages(pages: &[(u32, &str)]) -> String {
    if pages.is_empty() {
        return "(This is the first page)".to_string();
    }

    pages
        .iter()
        .map(|(number, text)| format!("Page {}: {}", number, text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_character_details(name: &str, description: &str, visual_traits: &[String]) -> String {
    let traits = if visual_traits.is_empty() {
        "not specified".to_string()
    } else {
        visual_traits.join(", ")
    };
    format!("{}: {}\nVisual traits: {}", name, description, traits)
}

/// Page ranges for a three-act story
///
/// The beginning is `1..=beginning_end`, the middle
/// `middle_start..=middle_end` and the ending `ending_start..=page_count`.
/// A range whose end is below its start is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoryStructure {
    pub beginning_end: u32,
    pub middle_start: u32,
    pub middle_end: u32,
    pub ending_start: u32,
}

pub fn calculate_story_structure(page_count: u32) -> StoryStructure {
    let (beginning_end, ending_start) = match page_count {
        0 | 1 => (0, 1),
        2..=4 => (1, page_count),
        5..=8 => (2, page_count - 1),
        n => (n / 4, n - n / 4 + 1),
    };

    StoryStructure {
        beginning_end,
        middle_start: beginning_end + 1,
        middle_end: ending_start - 1,
        ending_start,
    }
}
