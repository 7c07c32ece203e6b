pub const SAMPLE_CONFIG: &str = r#"version: 1

# Keys are "<name>.<version>:<vehicle>". `version: auto` follows the prompt
# template version, so a new prompt never serves old reports.
namespace:
  name: analysis
  version: auto

identifier:
  normalize: raw        # raw | canonical
  max_chars: 200

cache:
  concurrency: unlocked # unlocked | single_flight

store:
  backend: sqlite       # sqlite | memory | redis
  path: .carfacts/reports.db
  redis:
    host: 127.0.0.1
    port: 6379

generator:
  provider: openai      # openai | fake
  model: gpt-4-turbo
  max_tokens: 3000
  timeout_secs: 120

prompt_file: prompts/vehicle-report.yaml

resolver:
  model: gpt-4-turbo
  max_tokens: 50

suggest:
  endpoint: http://google.com/complete/search
"#;

pub const PROMPT_FILE: &str = "prompts/vehicle-report.yaml";

pub const GITIGNORE: &str = "/.carfacts/\n*.db\n*.db-shm\n*.db-wal\n";
