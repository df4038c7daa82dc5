use anyhow::{Result, anyhow, bail};
use std::path::{Component, Path};
use tokio::fs::create_dir_all;

pub async fn ensure_parent_dir_exists(path: &Path) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("No parent directory for {}", path.display()))?;
    create_dir_all(parent).await?;
    Ok(())
}

/// Rejects names that would resolve outside the directory they are joined to.
pub fn validate_relative_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Object name cannot be empty");
    }
    let all_normal = Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !all_normal {
        bail!("Object name '{name}' must be a relative path without '.' or '..' segments");
    }
    Ok(())
}
