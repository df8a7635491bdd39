use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use lampctl_core::{DeviceState, LampClient, Owner};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Both ends of the terminal are attached to a person.
pub fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(action: &str, message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !interactive() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Spinner on stderr; hidden when stderr is not a terminal.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
        .template("{spinner} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Device state, colored when stdout is a terminal.
pub fn paint_state(state: DeviceState) -> String {
    if !std::io::stdout().is_terminal() {
        return state.to_string();
    }
    match state {
        DeviceState::OnPaired => state.green().bold().to_string(),
        DeviceState::OnWaiting => state.yellow().to_string(),
        DeviceState::Off => state.dimmed().to_string(),
        DeviceState::NotConnected => state.red().to_string(),
    }
}

/// Open a session, offering a retry on transient failures.
///
/// There is no automatic reconnect: every retry is the operator's call,
/// and non-interactive runs fail on the first error.
pub async fn open_session(
    client: &LampClient,
    owner: Owner,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    loop {
        let pb = spinner(format!(
            "Connecting to {} as {owner}",
            client.config().address
        ));
        let result = client.open_session(owner).await;
        pb.finish_and_clear();

        match result {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && !global.yes && interactive() => {
                eprintln!("{} {e}", "!".yellow().bold());
                let retry = dialoguer::Confirm::new()
                    .with_prompt("Retry?")
                    .default(true)
                    .interact()
                    .map_err(prompt_err)?;
                if !retry {
                    return Err(e.into());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}
