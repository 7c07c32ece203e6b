pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
  key TEXT PRIMARY KEY,
  namespace TEXT NOT NULL,
  report TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_namespace ON reports(namespace);
"#;
