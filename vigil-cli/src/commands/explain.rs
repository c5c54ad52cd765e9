use colored::Colorize;
use vigil_core::ErrorHumanizer;

/// Split `"TypeName: detail"` into its parts when the prefix looks like an
/// error type name.
fn split_error_text(text: &str) -> Option<(&str, &str)> {
    let (name, detail) = text.split_once(':')?;
    let name = name.trim();
    let looks_like_type = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    looks_like_type.then(|| (name, detail.trim()))
}

pub fn cmd_explain(
    text: &str,
    kind: Option<&str>,
    context: Option<&str>,
    technical: bool,
) -> anyhow::Result<()> {
    let (type_name, message) = match kind {
        Some(kind) => (kind, text),
        None => split_error_text(text).unwrap_or(("Error", text)),
    };

    let humanized = ErrorHumanizer::new().humanize_text(type_name, message, context);

    println!("{}", humanized.context.dimmed());
    println!();
    println!("  {} {}", "✗".red().bold(), humanized.message.bold());
    println!("  {} {}", "→".blue(), humanized.suggestion);
    println!();
    println!("  {}", humanized.encouragement.green());

    if technical {
        println!();
        println!("  {}", "Technical details".yellow().bold());
        println!("    {}", humanized.technical_details);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_error_text() {
        assert_eq!(
            split_error_text("FileNotFoundError: No such file: 'a.py'"),
            Some(("FileNotFoundError", "No such file: 'a.py'"))
        );
        assert_eq!(split_error_text("something broke: badly"), None);
        assert_eq!(split_error_text("no separator"), None);
    }
}
