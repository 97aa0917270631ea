use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::app::{KindleError, Result};
use crate::config::MailSettings;
use crate::mail::MailSender;

const LINE_WIDTH: usize = 76;

/// Hands messages to the local MTA (`sendmail -t -oi`).
pub struct SendmailMailer {
    settings: MailSettings,
}

impl SendmailMailer {
    pub fn new(settings: MailSettings) -> Self {
        Self { settings }
    }

    async fn deliver(&self, message: Vec<u8>) -> Result<()> {
        let mut child = Command::new(&self.settings.sendmail_command)
            .args(["-t", "-oi"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                KindleError::Mail(format!(
                    "failed to run {}: {}",
                    self.settings.sendmail_command, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&message)
                .await
                .map_err(|e| KindleError::Mail(format!("failed to write message: {}", e)))?;
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(KindleError::Mail(format!(
                "{} exited with {}: {}",
                self.settings.sendmail_command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[async_trait]
impl MailSender for SendmailMailer {
    async fn send(&self, files: &[PathBuf], timeout_secs: u64) -> Result<()> {
        let mut attachments = Vec::new();
        for file in files {
            match tokio::fs::read(file).await {
                Ok(data) => attachments.push((file.clone(), data)),
                Err(e) => warn!(path = %file.display(), "Couldn't attach file: {}", e),
            }
        }

        if attachments.is_empty() {
            return Err(KindleError::Mail("no valid files to send".into()));
        }

        info!(
            files = attachments.len(),
            timeout_secs,
            receiver = %self.settings.receiver,
            "Sending mail"
        );

        let message = build_message(&self.settings, &attachments);
        tokio::time::timeout(Duration::from_secs(timeout_secs), self.deliver(message))
            .await
            .map_err(|_| KindleError::Mail(format!("timed out after {}s", timeout_secs)))??;

        info!(
            files = attachments.len(),
            receiver = %self.settings.receiver,
            "Mailed documents"
        );
        Ok(())
    }
}

/// Assemble a `multipart/mixed` message with base64 attachments.
pub fn build_message(settings: &MailSettings, attachments: &[(PathBuf, Vec<u8>)]) -> Vec<u8> {
    let boundary = format!("kindle-send-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
    let mut msg = String::new();

    msg.push_str(&format!("From: {}\r\n", settings.sender));
    msg.push_str(&format!("To: {}\r\n", settings.receiver));
    msg.push_str("Subject: kindle-send\r\n");
    msg.push_str(&format!("Date: {}\r\n", Utc::now().to_rfc2822()));
    msg.push_str("MIME-Version: 1.0\r\n");
    msg.push_str(&format!(
        "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
        boundary
    ));

    msg.push_str(&format!("--{}\r\n", boundary));
    msg.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n\r\n");

    for (path, data) in attachments {
        let name = attachment_name(path);
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        msg.push_str(&format!("--{}\r\n", boundary));
        msg.push_str(&format!("Content-Type: {}; name=\"{}\"\r\n", mime, name));
        msg.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n",
            name
        ));
        msg.push_str("Content-Transfer-Encoding: base64\r\n\r\n");

        let encoded = STANDARD.encode(data);
        for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
            msg.push_str(&String::from_utf8_lossy(chunk));
            msg.push_str("\r\n");
        }
    }

    msg.push_str(&format!("--{}--\r\n", boundary));
    msg.into_bytes()
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().replace(['"', '\r', '\n'], "_"))
        .unwrap_or_else(|| "attachment".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(command: &str) -> MailSettings {
        MailSettings {
            sender: "me@example.com".into(),
            receiver: "device@kindle.com".into(),
            sendmail_command: command.into(),
        }
    }

    #[test]
    fn test_build_message_headers_and_attachment() {
        let attachments = vec![(PathBuf::from("/tmp/a-read.html"), b"hello".to_vec())];
        let msg = String::from_utf8(build_message(&settings("sendmail"), &attachments)).unwrap();

        assert!(msg.starts_with("From: me@example.com\r\nTo: device@kindle.com\r\n"));
        assert!(msg.contains("Content-Type: multipart/mixed; boundary="));
        assert!(msg.contains("Content-Type: text/html; name=\"a-read.html\""));
        assert!(msg.contains("filename=\"a-read.html\""));
        assert!(msg.contains("aGVsbG8=\r\n"));
        assert!(msg.trim_end().ends_with("--"));
    }

    #[test]
    fn test_base64_lines_are_wrapped() {
        let attachments = vec![(PathBuf::from("big.pdf"), vec![7u8; 1000])];
        let msg = String::from_utf8(build_message(&settings("sendmail"), &attachments)).unwrap();
        assert!(msg.contains("Content-Type: application/pdf"));
        assert!(msg.split("\r\n").all(|line| line.len() <= 200));
    }

    #[tokio::test]
    async fn test_send_without_attachable_files_fails() {
        let mailer = SendmailMailer::new(settings("sendmail"));
        let err = mailer
            .send(&[PathBuf::from("/no/such/file.epub")], 60)
            .await
            .unwrap_err();
        assert!(matches!(err, KindleError::Mail(ref m) if m.contains("no valid files")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_send_pipes_message_to_command() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.html");
        std::fs::write(&doc, "<p>hi</p>").unwrap();

        // stands in for sendmail, ignoring its flags
        let script = dir.path().join("fake-sendmail");
        let capture = dir.path().join("captured.eml");
        std::fs::write(
            &script,
            format!("#!/bin/sh\ncat > '{}'\n", capture.display()),
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let mailer = SendmailMailer::new(settings(&script.to_string_lossy()));
        mailer
            .send(&[doc, dir.path().join("missing.pdf")], 60)
            .await
            .unwrap();

        let captured = std::fs::read_to_string(&capture).unwrap();
        assert!(captured.contains("filename=\"doc.html\""));
        assert!(!captured.contains("missing.pdf"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_is_mail_error() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("doc.html");
        std::fs::write(&doc, "<p>hi</p>").unwrap();

        let mailer = SendmailMailer::new(settings("false"));
        let err = mailer.send(&[doc], 60).await.unwrap_err();
        assert!(matches!(err, KindleError::Mail(_)));
    }
}
