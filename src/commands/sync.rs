use anyhow::Result;

use vary::resolver::tui::TuiResolver;
use vary::ui::prompt::TermPrompter;

pub fn run() -> Result<()> {
    let (store, ws) = super::existing_context()?;
    let mut prompter = TermPrompter;
    let mut resolver = TuiResolver;
    vary::sync::sync(&store, &ws, &mut prompter, &mut resolver)?;
    println!("sync complete");
    Ok(())
}
