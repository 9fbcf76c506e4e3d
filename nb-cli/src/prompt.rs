use std::io::BufRead;

use anyhow::{
    anyhow,
    bail,
};
use nb_core::prelude::*;

/// Asks before a destructive change.  An empty answer counts as yes.
pub fn confirm(message: &str, input: &mut impl BufRead) -> anyhow::Result<bool> {
    eprintln!("{message}");
    eprint!("Do you want to continue (Y/n)? ");

    let answer = input.lines().next().ok_or(anyhow!("could not read stdin"))??;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes"))
}

pub fn confirm_deletion(kind: &str, names: &[String], quiet: bool, input: &mut impl BufRead) -> EmptyResult {
    if quiet {
        return Ok(());
    }

    let listing: String = names.iter().map(|n| format!(" - [{n}]\n")).collect();
    if !confirm(&format!("The following {kind} will be deleted:\n{listing}"), input)? {
        bail!("aborted by user");
    }
    Ok(())
}
