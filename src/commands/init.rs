use anyhow::Result;

pub fn run() -> Result<()> {
    let (store, ws) = super::context()?;
    ws.init(&store)?;
    println!("workspace created at {}", ws.features_dir().display());
    Ok(())
}
