//! Interactive prompts.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use dialoguer::Input;

/// Ask which tag to deploy, offering `default` on empty input.
///
/// Only tags from `tags` are accepted.
pub fn tag_to_deploy(tags: &[String], default: Option<&str>) -> Result<String> {
    if !console::user_attended() {
        bail!("Cannot prompt for a tag without a terminal; pass --tag");
    }
    if tags.is_empty() {
        bail!("The repository has no tags to deploy");
    }

    println!();
    println!("{}", "Git tags:".bold());
    for tag in tags {
        println!("  {tag}");
    }
    println!();

    let mut input = Input::<String>::new().with_prompt("Tag to deploy");
    if let Some(default) = default {
        input = input.default(default.to_string());
    }

    let tag = input
        .validate_with(|candidate: &String| -> Result<(), String> {
            validate_tag(tags, candidate)
        })
        .interact_text()
        .context("Failed to read tag")?;

    Ok(tag.trim().to_string())
}

fn validate_tag(tags: &[String], candidate: &str) -> Result<(), String> {
    if tags.iter().any(|t| t == candidate.trim()) {
        Ok(())
    } else {
        Err(format!("`{}` is not a git tag", candidate.trim()))
    }
}
