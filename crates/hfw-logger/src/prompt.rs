//! Operator input
//!
//! Line-based prompts with no timeout: reading blocks until the operator
//! answers or the input closes.

use hfw_core::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Source of operator answers
pub struct OperatorInput {
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
}

impl OperatorInput {
    /// Read answers from stdin
    pub fn stdin() -> Self {
        Self::with_reader(BufReader::new(tokio::io::stdin()))
    }

    pub fn with_reader(reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    /// Wait for one line, returned without its line ending.
    ///
    /// Returns `None` once the input is closed.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Wait for a yes/no answer; anything not starting with `y` is a no
    pub async fn confirm(&mut self) -> Result<bool> {
        let answer = self.read_line().await?.unwrap_or_default();
        Ok(answer.trim().to_lowercase().starts_with('y'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_lines_until_closed() {
        let mut input = OperatorInput::with_reader(&b"first\r\nsecond\n"[..]);

        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(input.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_confirm() {
        let mut input = OperatorInput::with_reader(&b"Yes please\nno\n\n"[..]);

        assert!(input.confirm().await.unwrap());
        assert!(!input.confirm().await.unwrap());
        assert!(!input.confirm().await.unwrap());
        // closed input counts as no
        assert!(!input.confirm().await.unwrap());
    }
}
