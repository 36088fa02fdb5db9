//! `transit status`: print engine status and every registered transfer.

use anyhow::Result;
use serde_json::json;

use crate::bootstrap::CliContext;
use crate::presentation::render_status;

pub fn execute(ctx: &CliContext, as_json: bool) -> Result<()> {
    let status = ctx.manager.engine_status();
    let summaries = ctx.manager.summaries();

    if as_json {
        let out = json!({
            "save_directory": ctx.manager.config().save_directory,
            "engine": status,
            "transfers": summaries,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Saving to {}",
            ctx.manager.config().save_directory.display()
        );
        print!("{}", render_status(&status, &summaries));
    }
    Ok(())
}
