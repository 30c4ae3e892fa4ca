use std::error::Error;

use anima_core::ThemeMode;
use clap::Subcommand;

use crate::context::AppContext;

#[derive(Subcommand)]
pub enum ThemeAction {
    /// Print the stored theme
    Get,
    /// Store a theme: system, light, or dark
    Set { mode: ThemeMode },
}

pub fn run(action: ThemeAction) -> Result<(), Box<dyn Error>> {
    let ctx = AppContext::open()?;
    match action {
        ThemeAction::Get => {
            let mode = ctx.settings.theme_mode()?;
            println!("{}", serde_json::to_value(mode)?.as_str().unwrap_or_default());
        }
        ThemeAction::Set { mode } => {
            ctx.settings.set_theme_mode(mode)?;
            println!("ok");
        }
    }
    Ok(())
}
