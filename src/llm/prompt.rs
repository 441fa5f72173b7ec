/// The one placeholder recognised in system prompt templates.
pub const CONTENT_PLACEHOLDER: &str = "{CONTENT}";

/// Substitute the page content for every `{CONTENT}` token. Other braces are
/// left as written.
pub fn render_system_prompt(template: &str, content: &str) -> String {
    template.replace(CONTENT_PLACEHOLDER, content)
}
