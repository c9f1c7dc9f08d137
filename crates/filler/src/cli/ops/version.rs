use clap::Args;

use backup_filler::version::build_info;

#[derive(Args, Debug, Clone)]
pub struct Version {
    /// Print build information as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("Version operation failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Version {
    type Error = VersionError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let info = build_info();
        if self.json {
            return serde_json::to_string_pretty(&info).map_err(|e| VersionError::Failed(e.to_string()));
        }
        Ok(info.to_string())
    }
}
