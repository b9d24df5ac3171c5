//! Standard I/O transport.
//!
//! Newline-delimited JSON-RPC on stdin/stdout. Stdout carries protocol data
//! only; diagnostics go through tracing to stderr.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use super::handler::{encode, McpSession};
use super::tools::ToolDispatcher;

/// Serve one session over the given reader and writer until EOF
pub async fn serve<R, W>(dispatcher: Arc<ToolDispatcher>, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = McpSession::new(dispatcher);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(response) = session.handle_text(line).await else {
            continue;
        };

        let json = encode(&response);
        debug!("MCP TX: {}", json);
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    info!("stdin closed, MCP session ended");
    Ok(())
}

/// Serve MCP on the process's stdin/stdout
pub async fn serve_stdio(dispatcher: Arc<ToolDispatcher>) -> std::io::Result<()> {
    info!("Serving MCP over stdio");
    serve(
        dispatcher,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::Value;

    use crate::config::{ScriptConfig, TimeoutConfig};
    use crate::container::ContainerManager;
    use crate::process::{ExecutionResult, MockCommandRunner};

    fn dispatcher() -> Arc<ToolDispatcher> {
        let mut runner = MockCommandRunner::new();
        runner.expect_output().returning(|_, _| {
            Ok(ExecutionResult::completed(
                Some(0),
                String::new(),
                String::new(),
                Duration::from_millis(1),
            ))
        });
        let manager = ContainerManager::new(
            Arc::new(runner),
            TimeoutConfig::default(),
            ScriptConfig::default(),
        );
        Arc::new(ToolDispatcher::new(Arc::new(manager)))
    }

    #[tokio::test]
    async fn test_one_line_per_request() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"list_containers","arguments":{"show_all":false}}}"#,
            "\n",
        );
        let mut output = Vec::new();

        serve(dispatcher(), input.as_bytes(), &mut output).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[1]["id"], 2);
        assert_eq!(
            replies[1]["result"]["content"][0]["text"],
            "No running containers found."
        );
    }

    #[tokio::test]
    async fn test_eof_ends_cleanly() {
        let mut output = Vec::new();
        serve(dispatcher(), &b""[..], &mut output).await.unwrap();
        assert!(output.is_empty());
    }
}
