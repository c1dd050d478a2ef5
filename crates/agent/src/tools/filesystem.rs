//! File writer tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::path_utils::resolve_output_path;
use super::{ToolError, ToolResult, ToolTrait};

const NAME: &str = "write_file";

/// Writes UTF-8 text to a file under the output directory
pub struct FileWriterTool {
    root: PathBuf,
}

impl FileWriterTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    #[serde(alias = "filename")]
    path: String,
    content: String,
}

#[async_trait]
impl ToolTrait for FileWriterTool {
    fn name(&self) -> &str {
        NAME
    }
    fn description(&self) -> &str {
        "Write content to a file in the output directory. Creates directories if needed."
    }
    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File name or relative path" },
                "content": { "type": "string", "description": "Text to write" }
            },
            "required": ["path", "content"]
        })
    }
    async fn execute(&self, args: serde_json::Value) -> ToolResult {
        let args: WriteFileArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::new(NAME, format!("invalid arguments: {}", e)))?;
        let path =
            resolve_output_path(&args.path, &self.root).map_err(|e| ToolError::new(NAME, e))?;

        debug!("◆ WRITING {:?}", path);
        let io_err = |e: std::io::Error| ToolError::new(NAME, format!("{}: {}", args.path, e));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut file = tokio::fs::File::create(&path).await.map_err(io_err)?;
        file.write_all(args.content.as_bytes())
            .await
            .map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        Ok(format!(
            "◆ WROTE {} BYTES TO {}",
            args.content.len(),
            args.path
        ))
    }
}
