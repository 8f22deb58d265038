use anyhow::Result;
use clap::Subcommand;

use vary::delimiters;
use vary::report::render_table;

/// Subcommands for `vary delimiters`.
#[derive(Subcommand, Debug)]
pub enum DelimiterCommands {
    /// List every registered extension and its markers
    List,

    /// Register or replace the delimiter pair for an extension
    Set {
        /// File extension including the leading dot, e.g. `.rs`
        extension: String,
        /// Opening comment marker
        start: String,
        /// Closing comment marker
        end: String,
    },

    /// Remove the delimiter for an extension (the default is protected)
    Delete {
        /// File extension including the leading dot
        extension: String,
    },
}

pub fn run(cmd: DelimiterCommands) -> Result<()> {
    let (store, ws) = super::existing_context()?;
    let file = ws.delimiters_file();

    match cmd {
        DelimiterCommands::List => {
            let registry = delimiters::load(&store, &file)?;
            let rows: Vec<Vec<String>> = registry
                .iter()
                .map(|(ext, d)| vec![ext.clone(), d.start.clone(), d.end.clone()])
                .collect();
            print!("{}", render_table(&["EXTENSION", "START", "END"], &rows));
        }
        DelimiterCommands::Set {
            extension,
            start,
            end,
        } => {
            delimiters::set(&store, &file, &extension, &start, &end)?;
            println!("delimiter for {extension} set");
        }
        DelimiterCommands::Delete { extension } => {
            delimiters::delete(&store, &file, &extension)?;
            println!("delimiter for {extension} deleted");
        }
    }
    Ok(())
}
