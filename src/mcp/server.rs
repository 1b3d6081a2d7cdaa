//! Worker main loop.
//!
//! Reads one line, decodes it, dispatches it, writes the single response, and
//! only then reads the next line. End of input is a clean shutdown; so is
//! SIGINT/SIGTERM (Ctrl+C on Windows) when running under [`McpServer::run`].
//!
//! A bad line never ends the loop: it is answered with an error frame. Only
//! I/O failures on the transport itself are returned to the caller.

use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::protocol::{decode, JsonRpcResponse};
use crate::mcp::transport::Transport;

/// Server state in the worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Reading and answering requests.
    Running,
    /// Input closed or a shutdown signal arrived.
    ShuttingDown,
}

/// A worker: a dispatcher bound to a transport.
#[derive(Debug)]
pub struct McpServer<R, W> {
    state: ServerState,
    transport: Transport<R, W>,
    dispatcher: Dispatcher,
    handled: u64,
}

impl<R, W> McpServer<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a server over the given transport.
    #[must_use]
    pub const fn new(dispatcher: Dispatcher, transport: Transport<R, W>) -> Self {
        Self {
            state: ServerState::Running,
            transport,
            dispatcher,
            handled: 0,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Number of requests answered so far.
    #[must_use]
    pub const fn handled(&self) -> u64 {
        self.handled
    }

    /// Consumes the server, returning its transport.
    pub fn into_transport(self) -> Transport<R, W> {
        self.transport
    }

    /// Runs until end of input or a shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.run_with_shutdown().await
    }

    /// Runs until end of input, ignoring signals.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    pub async fn run_until_eof(&mut self) -> std::io::Result<()> {
        loop {
            let line_result = self.transport.read_line().await;
            if self.handle_transport_result(line_result).await? {
                return Ok(());
            }
        }
    }

    #[cfg(unix)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(std::io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(std::io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    #[cfg(windows)]
    async fn run_with_shutdown(&mut self) -> std::io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                    self.state = ServerState::ShuttingDown;
                    return Ok(());
                }

                line_result = self.transport.read_line() => {
                    if self.handle_transport_result(line_result).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handles the result of one transport read.
    ///
    /// Returns `true` if the server should shut down.
    async fn handle_transport_result(
        &mut self,
        line_result: std::io::Result<Option<String>>,
    ) -> std::io::Result<bool> {
        let line = match line_result {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!(handled = self.handled, "Input closed, shutting down");
                self.state = ServerState::ShuttingDown;
                return Ok(true);
            }
            // A line that is not UTF-8 is unreadable input, not a broken pipe.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(error = %e, "Discarding undecodable input line");
                self.write_parse_error().await?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        self.handle_line(&line).await?;
        Ok(self.state == ServerState::ShuttingDown)
    }

    /// Decodes, dispatches and answers a single line.
    async fn handle_line(&mut self, line: &str) -> std::io::Result<()> {
        let response = match decode(line) {
            Ok(None) => return Ok(()),
            Ok(Some(request)) => self.dispatcher.dispatch(request).await,
            Err(e) => {
                debug!(error = %e, "Rejected input line");
                e.into_response()
            }
        };

        self.transport.write_response(&response).await?;
        self.handled += 1;
        Ok(())
    }

    async fn write_parse_error(&mut self) -> std::io::Result<()> {
        let response = JsonRpcResponse::parse_error();
        self.transport.write_response(&response).await?;
        self.handled += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::dispatcher::ServerInfo;
    use crate::mcp::registry::ToolRegistry;
    use serde_json::Value;

    fn server(input: &'static [u8]) -> McpServer<&'static [u8], Vec<u8>> {
        let registry = ToolRegistry::builder().build().unwrap();
        let dispatcher = Dispatcher::new(ServerInfo::new("test"), registry);
        McpServer::new(dispatcher, Transport::new(input, Vec::new()))
    }

    fn output_lines(server: McpServer<&'static [u8], Vec<u8>>) -> Vec<Value> {
        let (_, written) = server.into_transport().into_parts();
        String::from_utf8(written)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn eof_shuts_down_cleanly() {
        let mut server = server(b"");
        server.run_until_eof().await.unwrap();
        assert_eq!(server.state(), ServerState::ShuttingDown);
        assert_eq!(server.handled(), 0);
    }

    #[tokio::test]
    async fn blank_lines_produce_no_output() {
        let mut server = server(b"\n   \n\r\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n\n");
        server.run_until_eof().await.unwrap();
        assert_eq!(server.handled(), 1);

        let lines = output_lines(server);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["result"]["status"], "ok");
    }

    #[tokio::test]
    async fn survives_a_malformed_line() {
        let mut server = server(b"{oops\n{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"ping\"}\n");
        server.run_until_eof().await.unwrap();

        let lines = output_lines(server);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 0);
        assert_eq!(lines[0]["error"]["code"], -32700);
        assert_eq!(lines[1]["id"], 9);
        assert_eq!(lines[1]["result"]["status"], "ok");
    }

    #[tokio::test]
    async fn non_utf8_line_is_a_parse_error() {
        let mut server = server(b"\xff\xfe\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");
        server.run_until_eof().await.unwrap();

        let lines = output_lines(server);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["error"]["code"], -32700);
        assert_eq!(lines[1]["result"]["status"], "ok");
    }
}
