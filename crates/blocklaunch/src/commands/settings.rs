//! Settings commands

use super::CommandContext;
use anyhow::Result;
use blocklaunch_core::settings::Settings;
use std::path::PathBuf;

/// Changes requested by `settings set`
#[derive(Debug, Default)]
pub struct SettingsUpdate {
    pub min_ram: Option<String>,
    pub max_ram: Option<String>,
    pub java_path: Option<PathBuf>,
    pub minimize_on_launch: Option<bool>,
    pub language: Option<String>,
}

impl SettingsUpdate {
    fn is_empty(&self) -> bool {
        self.min_ram.is_none()
            && self.max_ram.is_none()
            && self.java_path.is_none()
            && self.minimize_on_launch.is_none()
            && self.language.is_none()
    }

    fn apply(self, settings: &mut Settings) {
        if let Some(min_ram) = self.min_ram {
            settings.runtime.min_memory = min_ram;
        }
        if let Some(max_ram) = self.max_ram {
            settings.runtime.max_memory = max_ram;
        }
        if let Some(java_path) = self.java_path {
            settings.runtime.runtime_path = Some(java_path);
        }
        if let Some(minimize) = self.minimize_on_launch {
            settings.launcher.minimize_on_launch = minimize;
        }
        if let Some(language) = self.language {
            settings.launcher.language = language;
        }
    }
}

/// Print the effective settings
pub fn execute_show(ctx: &CommandContext) -> Result<()> {
    let settings = ctx.settings_store().load();
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

/// Update settings and print the result
pub fn execute_set(ctx: &CommandContext, update: SettingsUpdate) -> Result<()> {
    if update.is_empty() {
        anyhow::bail!("Nothing to change; pass at least one setting (see --help)");
    }
    let store = ctx.settings_store();
    let mut settings = store.load();
    update.apply(&mut settings);
    store.save(&settings)?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
