//! Line-oriented message bus reader.
//!
//! Each line is `<key> <value>`, e.g. `userDeleted user-1` or
//! `timezoneChange user-1:Europe/Berlin`. Blank lines are skipped; a line
//! without a value is forwarded with an empty one so the dispatcher can
//! report it.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Split one bus line into key and value.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Some((key.to_string(), value.trim().to_string()))
}

/// Forward every line of `reader` into `sender` until EOF or the receiver
/// goes away.
pub async fn forward_lines<R>(reader: R, sender: mpsc::Sender<(String, String)>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(message) = parse_line(&line) else { continue };
                if sender.send(message).await.is_err() {
                    debug!("bus receiver closed");
                    return;
                }
            }
            Ok(None) => {
                debug!("bus input closed");
                return;
            }
            Err(err) => {
                warn!(error = %err, "failed to read bus input");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_split_on_first_whitespace() {
        assert_eq!(
            parse_line("timezoneChange  user-1:Europe/Berlin\n"),
            Some(("timezoneChange".to_string(), "user-1:Europe/Berlin".to_string()))
        );
        assert_eq!(parse_line("userDeleted"), Some(("userDeleted".to_string(), String::new())));
        assert_eq!(parse_line("   "), None);
    }

    #[tokio::test]
    async fn forwards_until_eof() {
        let input: &[u8] = b"userDeleted user-1\n\nother x\n";
        let (sender, mut receiver) = mpsc::channel(8);

        forward_lines(input, sender).await;

        assert_eq!(receiver.recv().await, Some(("userDeleted".to_string(), "user-1".to_string())));
        assert_eq!(receiver.recv().await, Some(("other".to_string(), "x".to_string())));
        assert_eq!(receiver.recv().await, None);
    }
}
