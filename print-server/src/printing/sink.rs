//! Print sinks

use async_trait::async_trait;
use serde::Serialize;
use shared::order::{PrintConfig, PrintOrder};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Print job rejected: {0}")]
    Rejected(String),
}

/// What the printer needs to know about a redeemed order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    pub order_id: String,
    pub order_no: String,
    pub file_ref: String,
    pub print_config: PrintConfig,
    pub page_count: u32,
    pub submitted_at: i64,
}

impl PrintJob {
    pub fn from_order(order: &PrintOrder, submitted_at: i64) -> Self {
        Self {
            order_id: order.order_id.clone(),
            order_no: order.order_no.clone(),
            file_ref: order.file_ref.clone(),
            print_config: order.print_config,
            page_count: order.page_count,
            submitted_at,
        }
    }
}

/// Downstream printer / spooler
#[async_trait]
pub trait PrintSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn submit(&self, job: &PrintJob) -> Result<(), PrintError>;
}

/// Logs the job and accepts it (no physical printer attached)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPrintSink;

#[async_trait]
impl PrintSink for LogPrintSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn submit(&self, job: &PrintJob) -> Result<(), PrintError> {
        tracing::info!(
            order_no = %job.order_no,
            file_ref = %job.file_ref,
            pages = job.page_count,
            copies = job.print_config.copies,
            color = %job.print_config.color_mode.as_str(),
            duplex = %job.print_config.duplex.as_str(),
            paper = %job.print_config.paper_size.as_str(),
            "Print job submitted"
        );
        Ok(())
    }
}

/// Writes each job as `<order_no>.json` into a spool directory
#[derive(Debug, Clone)]
pub struct SpoolDirSink {
    dir: PathBuf,
}

impl SpoolDirSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn job_path(&self, job: &PrintJob) -> PathBuf {
        self.dir.join(format!("{}.json", job.order_no))
    }
}

#[async_trait]
impl PrintSink for SpoolDirSink {
    fn name(&self) -> &'static str {
        "spool_dir"
    }

    async fn submit(&self, job: &PrintJob) -> Result<(), PrintError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.job_path(job);
        if tokio::fs::try_exists(&path).await? {
            return Err(PrintError::Rejected(format!(
                "job {} already spooled",
                job.order_no
            )));
        }

        // 先写临时文件再改名，打印端不会读到半个文件
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(job)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(path = %path.display(), "Print job spooled");
        Ok(())
    }
}
