use anyhow::Result;
use console::style;
use dialoguer::Confirm;
use pystrip_core::{OverwritePolicy, output_path_for};
use std::path::PathBuf;

pub fn confirm_processing(
    files: &[PathBuf],
    overwrite: OverwritePolicy,
    no_confirm: bool,
) -> Result<bool> {
    if no_confirm {
        return Ok(true);
    }
    if files.is_empty() {
        println!("No files to process.");
        return Ok(false);
    }

    let existing = files
        .iter()
        .filter(|f| output_path_for(f).exists())
        .count();
    let mut prompt = format!("Strip comments from {} files?", style(files.len()).cyan());
    if existing > 0 {
        let note = match overwrite {
            OverwritePolicy::Overwrite => "will be overwritten",
            OverwritePolicy::KeepExisting => "will be kept and their inputs fail",
        };
        prompt.push_str(&format!(
            " ({} existing _no_comments {} {})",
            style(existing).yellow(),
            if existing == 1 { "output" } else { "outputs" },
            note
        ));
    }

    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    if !confirmed {
        println!("Aborted by user.");
    }

    Ok(confirmed)
}
