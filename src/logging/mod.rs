//! Structured logging helpers
//!
//! Filter construction for the tracing subscriber and the privacy-safe
//! prompt preview used by the router.

pub mod fields;

pub use fields::{truncate_prompt, PROMPT_PREVIEW_CHARS};

/// Build filter directives string from LoggingConfig
///
/// The base level comes first, followed by one `arbiter::<component>=<level>`
/// directive per configured component, in component name order.
///
/// # Examples
///
/// ```
/// use arbiter::config::LoggingConfig;
/// use arbiter::logging::build_filter_directives;
/// use std::collections::BTreeMap;
///
/// let config = LoggingConfig {
///     component_levels: BTreeMap::from([
///         ("routing".to_string(), "debug".to_string()),
///         ("api".to_string(), "warn".to_string()),
///     ]),
///     ..Default::default()
/// };
///
/// assert_eq!(
///     build_filter_directives(&config),
///     "info,arbiter::api=warn,arbiter::routing=debug"
/// );
/// ```
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    for (component, level) in &config.component_levels {
        filter_str.push_str(&format!(",arbiter::{}={}", component, level));
    }

    filter_str
}
