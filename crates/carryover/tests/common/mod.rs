//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Two labels, one Gmail system folder and one excluded category.
pub const EXPORT: &str = r#"{
  "categories": [
    {
      "name": "INBOX",
      "items": [
        {"id": "m1", "content": "Subject: one\r\n\r\nfirst", "flags": ["\\Seen"], "timestamp": "2024-02-03T04:05:06Z"},
        {"id": "m2", "content": "Subject: two\r\n\r\nsecond"}
      ]
    },
    {
      "name": "[Gmail]/Sent Mail",
      "items": [
        {"id": "m3", "content": "Subject: three\r\n\r\nthird", "flags": ["\\Seen", "\\Flagged"]}
      ]
    },
    {"name": "CHAT", "items": [{"id": "c1", "content": "chat"}]}
  ]
}"#;

/// A workspace with an export file and a config pointing into it.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("export.json"), EXPORT).unwrap();
        let fixture = Self { dir };
        fixture.write_config("");
        fixture
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path("carryover.yaml")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.path("progress.json")
    }

    pub fn mail_dir(&self) -> PathBuf {
        self.path("mail")
    }

    /// Writes the config; `extra_settings` is appended under `settings:`.
    pub fn write_config(&self, extra_settings: &str) {
        let yaml = format!(
            r#"source:
  type: json_file
  path: "{export}"
destination:
  type: directory
  path: "{mail}"
settings:
  page_size: 1
  checkpoint_path: "{checkpoint}"
  retry:
    base_delay_ms: 1
    max_delay_ms: 2
  mapping:
    overrides:
      "[Gmail]/Sent Mail": Sent
{extra_settings}"#,
            export = yaml_path(&self.path("export.json")),
            mail = yaml_path(&self.mail_dir()),
            checkpoint = yaml_path(&self.checkpoint_path()),
        );
        fs::write(self.config_path(), yaml).unwrap();
    }
}

fn yaml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}
