//! Models command implementation

use crate::cli::output::{format_models_json, format_models_table, ModelView};
use crate::cli::ModelsArgs;
use crate::config::ArbiterConfig;

/// Handle `arbiter models`
pub fn handle_models(
    args: &ModelsArgs,
    config: &ArbiterConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let models: Vec<ModelView> = config
        .models
        .iter()
        .filter(|m| {
            args.provider
                .as_deref()
                .map_or(true, |p| m.provider.eq_ignore_ascii_case(p))
        })
        .map(ModelView::from)
        .collect();

    if models.is_empty() {
        if let Some(provider) = &args.provider {
            return Err(format!("No models configured for provider: {}", provider).into());
        }
    }

    if args.json {
        Ok(format_models_json(&models))
    } else {
        Ok(format_models_table(&models))
    }
}
