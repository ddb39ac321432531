//! Diagram blocks and the asynchronous diagram typesetter.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use uuid::Uuid;

/// Prefix of every diagram placeholder id.
pub const ID_PREFIX: &str = "mermaid-";

/// A diagram block found during conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramNode {
    pub id: String,
    pub source_text: String,
}

/// How placeholder ids are generated for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramIds {
    /// A fresh UUID per diagram per pass.
    #[default]
    Random,
    /// `mermaid-1`, `mermaid-2`, … restarting every pass.
    Sequential,
}

#[derive(Debug, Clone)]
pub struct DiagramIdGenerator {
    strategy: DiagramIds,
    issued: usize,
}

impl DiagramIdGenerator {
    pub fn new(strategy: DiagramIds) -> Self {
        Self {
            strategy,
            issued: 0,
        }
    }

    pub fn next_id(&mut self) -> String {
        self.issued += 1;
        match self.strategy {
            DiagramIds::Random => format!("{ID_PREFIX}{}", Uuid::new_v4().simple()),
            DiagramIds::Sequential => format!("{ID_PREFIX}{}", self.issued),
        }
    }
}

/// Colour scheme handed to the diagram renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagramTheme {
    #[default]
    Default,
    Dark,
}

impl DiagramTheme {
    pub fn from_dark_mode(dark_mode: bool) -> Self {
        if dark_mode { Self::Dark } else { Self::Default }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dark => "dark",
        }
    }
}

#[derive(Error, Debug)]
pub enum DiagramError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error talking to diagram renderer: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Rejected(String),
    #[error("renderer produced invalid output: {0}")]
    InvalidOutput(String),
    #[error("diagram rendering timed out after {0:?}")]
    TimedOut(Duration),
}

pub type DiagramFuture<'a> = Pin<Box<dyn Future<Output = Result<String, DiagramError>> + 'a>>;

/// Renders one diagram to SVG markup. Each call succeeds or fails on its own.
pub trait DiagramTypesetter {
    fn typeset<'a>(
        &'a self,
        id: &'a str,
        source: &'a str,
        theme: DiagramTheme,
    ) -> DiagramFuture<'a>;
}

/// Runs mermaid-cli (`mmdc`) once per diagram, source on stdin and SVG on
/// stdout.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for MermaidCli {
    fn default() -> Self {
        Self::new("mmdc")
    }
}

impl MermaidCli {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Some(Self::DEFAULT_TIMEOUT),
        }
    }

    /// Arguments placed before the mermaid-cli flags, for launchers such as
    /// `npx -p @mermaid-js/mermaid-cli mmdc`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(
        &self,
        id: &str,
        source: &str,
        theme: DiagramTheme,
    ) -> Result<String, DiagramError> {
        let svg_id = format!("{id}-svg");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(["--input", "-", "--output", "-", "--outputFormat", "svg"])
            .args(["--quiet", "--theme", theme.as_str(), "--svgId", svg_id.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DiagramError::Launch {
                program: self.program.display().to_string(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            return Err(DiagramError::Rejected(if message.is_empty() {
                format!("renderer exited with {}", output.status)
            } else {
                message.to_string()
            }));
        }

        let svg = String::from_utf8(output.stdout)
            .map_err(|e| DiagramError::InvalidOutput(e.to_string()))?;
        if !svg.contains("<svg") {
            return Err(DiagramError::InvalidOutput("no <svg> element".to_string()));
        }
        Ok(svg.trim().to_string())
    }
}

impl DiagramTypesetter for MermaidCli {
    fn typeset<'a>(
        &'a self,
        id: &'a str,
        source: &'a str,
        theme: DiagramTheme,
    ) -> DiagramFuture<'a> {
        Box::pin(async move {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.run(id, source, theme))
                    .await
                    .map_err(|_| DiagramError::TimedOut(limit))?,
                None => self.run(id, source, theme).await,
            }
        })
    }
}
