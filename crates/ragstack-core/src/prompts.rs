//! Built-in agent instruction and prompt-override templates.
//!
//! Templates are opaque to ragstack. Placeholders such as `$question$` are
//! filled in by the agent service at invocation time.

use ragstack_contracts::agent::{
    InferenceSettings, OverrideMode, PromptOverride, PromptOverrides, PromptType,
};

pub const DEFAULT_INSTRUCTION: &str = include_str!("../prompts/instruction.txt");
pub const PRE_PROCESSING_TEMPLATE: &str = include_str!("../prompts/pre_processing.txt");
pub const ORCHESTRATION_TEMPLATE: &str = include_str!("../prompts/orchestration.txt");
pub const POST_PROCESSING_TEMPLATE: &str = include_str!("../prompts/post_processing.txt");

/// Handler source packaged for the action group when no file is configured.
pub const BUNDLED_HANDLER_NAME: &str = "index.mjs";
pub const BUNDLED_HANDLER: &[u8] = include_bytes!("../assets/password-reset/index.mjs");

/// Overrides for the pre-processing, orchestration and post-processing
/// stages.
///
/// Parser mode is `OVERRIDDEN` only when a parser function is supplied;
/// otherwise the service's default parser handles model output.
pub fn default_prompt_overrides(parser_function_arn: Option<String>) -> PromptOverrides {
    let parser_mode = if parser_function_arn.is_some() {
        OverrideMode::Overridden
    } else {
        OverrideMode::Default
    };

    let prompt = |prompt_type, template: &str| PromptOverride {
        prompt_type,
        base_template: template.to_string(),
        inference: InferenceSettings::default(),
        creation_mode: OverrideMode::Overridden,
        parser_mode,
        enabled: true,
    };

    PromptOverrides {
        parser_function_arn,
        prompts: vec![
            prompt(PromptType::PreProcessing, PRE_PROCESSING_TEMPLATE),
            prompt(PromptType::Orchestration, ORCHESTRATION_TEMPLATE),
            prompt(PromptType::PostProcessing, POST_PROCESSING_TEMPLATE),
        ],
    }
}
