use std::path::Path;

use anyhow::bail;
use eams_core::EamsConfig;

pub fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let rendered = EamsConfig::scaffold().to_toml_string()?;
    std::fs::write(path, rendered)?;
    println!("✓ Generated {}", path.display());
    println!("  Set client.cookie or EAMS_COOKIE, then list lessons under [[targets]].");
    Ok(())
}
