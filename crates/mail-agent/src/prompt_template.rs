use minijinja::Environment;
use once_cell::sync::Lazy;
use serde::Serialize;

// Templates compiled into the binary, looked up by file name
const EMBEDDED_TEMPLATES: &[(&str, &str)] = &[("system.md", include_str!("prompts/system.md"))];

static GLOBAL_ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_loader(|name| {
        Ok(EMBEDDED_TEMPLATES
            .iter()
            .find(|(file, _)| *file == name)
            .map(|(_, source)| source.to_string()))
    });
    env
});

/// Render one of the embedded prompt files with the given context
pub fn render_global_file<T: Serialize>(
    template_name: &str,
    context_data: &T,
) -> Result<String, minijinja::Error> {
    let template = GLOBAL_ENV.get_template(template_name)?;
    let rendered = template.render(context_data)?;
    Ok(rendered.trim().to_string())
}

/// Render a caller supplied template string once, with the same settings as the embedded files
pub fn render_inline_once<T: Serialize>(
    template_str: &str,
    context_data: &T,
) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("inline", template_str)?;
    let rendered = env.get_template("inline")?.render(context_data)?;
    Ok(rendered.trim().to_string())
}
