use super::args::*;
use carfacts_core::cache::ReportCache;
use carfacts_core::config::{self, AppConfig, GeneratorProvider};
use carfacts_core::generator::{LlmReportGenerator, ReportGenerator};
use carfacts_core::narration::{narrate_report, strip_markup_for_narration, AudioFormat, TranscriptSink};
use carfacts_core::prompt::BUILTIN_PROMPT_YAML;
use carfacts_core::providers::llm::{FakeClient, LlmClient, OpenAIClient};
use carfacts_core::providers::suggest::{SearchCompletionSource, SuggestionSource};
use carfacts_core::providers::vision::{
    OpenAiVisionResolver, StaticResolver, VehicleIdentifierResolver,
};
use carfacts_core::storage::open_store;
use carfacts_core::{AnalysisInput, ConfigError, ReportError, VehicleAssistant};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const NOT_FOUND: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const STORE_UNAVAILABLE: i32 = 3;
}

/// Vehicle reported by the offline image resolver.
const FAKE_RESOLVED_VEHICLE: &str = "2019 Mazda MX-5 Miata";

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Analyze(args) => cmd_analyze(&cli.config, args).await,
        Command::Suggest(args) => cmd_suggest(&cli.config, args).await,
        Command::Cache(args) => match args.cmd {
            CacheSub::Get { identifier } => cmd_cache_get(&cli.config, &identifier).await,
        },
        Command::Strip(args) => cmd_strip(args),
        Command::Init => cmd_init(&cli.config),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

async fn cmd_analyze(config_path: &Path, args: AnalyzeArgs) -> anyhow::Result<i32> {
    let mut cfg = match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(code) => return Ok(code),
    };
    if let Some(provider) = args.generator {
        cfg.generator.provider = provider;
    }

    let input = match (&args.query, &args.image) {
        (Some(q), _) => AnalysisInput::Query(q.clone()),
        (None, Some(path)) => match tokio::fs::read(path).await {
            Ok(bytes) => AnalysisInput::Image(bytes),
            Err(e) => {
                eprintln!("error: cannot read image {}: {}", path.display(), e);
                return Ok(exit_codes::CONFIG_ERROR);
            }
        },
        (None, None) => {
            eprintln!("error: one of --query or --image is required");
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let from_image = matches!(input, AnalysisInput::Image(_));

    let clients = match build_clients(&cfg, cfg.generator.provider) {
        Ok(c) => c,
        Err(e) => return Ok(config_error(&e)),
    };
    let assistant = match build_assistant(&cfg, clients).await {
        Ok(a) => a,
        Err(code) => return Ok(code),
    };

    let analysis = match assistant.analyze(input, args.refresh).await {
        Ok(a) => a,
        Err(e) => return Ok(report_error(&e)),
    };

    if from_image {
        eprintln!("identified: {}", analysis.identifier);
    }
    eprintln!("source: {}", analysis.source.as_str());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("{}", analysis.report);
    }

    // The report is already out; a narration failure only affects the transcript.
    if let Some(path) = &args.narrate {
        let sink = TranscriptSink::new(path);
        match narrate_report(&sink, &analysis.report, AudioFormat::PlainText).await {
            Ok(()) => eprintln!("narration written to {}", path.display()),
            Err(e) => {
                tracing::warn!(event = "narration.failed", path = %path.display(), error = %e);
                eprintln!("warning: narration failed: {:#}", e);
            }
        }
    }
    Ok(exit_codes::OK)
}

async fn cmd_suggest(config_path: &Path, args: SuggestArgs) -> anyhow::Result<i32> {
    let cfg = match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(code) => return Ok(code),
    };
    let source = SearchCompletionSource::new(cfg.suggest.endpoint.clone())?;
    for s in source.suggest(&args.partial).await {
        println!("{}", s);
    }
    Ok(exit_codes::OK)
}

async fn cmd_cache_get(config_path: &Path, raw: &str) -> anyhow::Result<i32> {
    let cfg = match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(code) => return Ok(code),
    };
    // Lookups never generate: offline clients, configured namespace.
    let clients = match build_clients(&cfg, GeneratorProvider::Fake) {
        Ok(c) => c,
        Err(e) => return Ok(config_error(&e)),
    };
    let assistant = match build_assistant(&cfg, clients).await {
        Ok(a) => a,
        Err(code) => return Ok(code),
    };
    let cache = assistant.cache();

    let identifier = match cache.parse_identifier(raw) {
        Ok(id) => id,
        Err(e) => return Ok(report_error(&e)),
    };
    match cache.lookup(&identifier).await {
        Ok(Some(report)) => {
            eprintln!("key: {}", cache.key_for(&identifier));
            println!("{}", report);
            Ok(exit_codes::OK)
        }
        Ok(None) => {
            eprintln!("no stored report for '{}'", identifier);
            Ok(exit_codes::NOT_FOUND)
        }
        Err(e) => Ok(report_error(&e)),
    }
}

fn cmd_strip(args: StripArgs) -> anyhow::Result<i32> {
    let text = match std::fs::read_to_string(&args.file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("error: cannot read {}: {}", args.file.display(), e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    print!("{}", strip_markup_for_narration(&text));
    Ok(exit_codes::OK)
}

fn cmd_init(config_path: &Path) -> anyhow::Result<i32> {
    write_file_if_missing(config_path, crate::templates::SAMPLE_CONFIG)?;
    let base = config_path.parent().unwrap_or(Path::new("."));
    write_file_if_missing(&base.join(crate::templates::PROMPT_FILE), BUILTIN_PROMPT_YAML)?;
    write_file_if_missing(&base.join(".gitignore"), crate::templates::GITIGNORE)?;
    Ok(exit_codes::OK)
}

fn write_file_if_missing(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    if !path.exists() {
        std::fs::write(path, content)?;
        eprintln!("created {}", path.display());
    } else {
        eprintln!("note: {} already exists (skipped)", path.display());
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<AppConfig, i32> {
    config::load_or_default(path).map_err(|e| config_error(&e))
}

fn config_error(e: &ConfigError) -> i32 {
    eprintln!("config error: {}", e);
    exit_codes::CONFIG_ERROR
}

fn report_error(e: &ReportError) -> i32 {
    if e.is_service_unavailable() {
        tracing::error!(event = "analyze.failed", error = ?e);
    } else {
        tracing::warn!(event = "analyze.rejected", error = %e);
    }
    eprintln!("error: {}", e.user_message());
    eprintln!("cause: {}", e);
    e.exit_code()
}

async fn build_assistant(cfg: &AppConfig, clients: Clients) -> Result<VehicleAssistant, i32> {
    let template = cfg.load_prompt().map_err(|e| config_error(&e))?;
    let namespace = cfg.namespace(&template).map_err(|e| config_error(&e))?;

    let store = open_store(&cfg.store).await.map_err(|e| {
        eprintln!("error: report store unavailable: {:#}", e);
        exit_codes::STORE_UNAVAILABLE
    })?;

    let (client, resolver) = clients;
    let backend = store.backend_name();
    let generator: Arc<dyn ReportGenerator> = Arc::new(LlmReportGenerator::new(client));
    let cache = ReportCache::new(namespace, store, generator, template, cfg.cache_options());

    tracing::info!(
        event = "assistant.ready",
        namespace = %cache.namespace(),
        backend,
        template = %cache.template().id,
        template_version = %cache.template().version,
        template_fingerprint = %cache.template().fingerprint(),
        concurrency = ?cache.options().concurrency,
    );

    Ok(VehicleAssistant::new(Arc::new(cache)).with_resolver(resolver))
}

type Clients = (Arc<dyn LlmClient>, Arc<dyn VehicleIdentifierResolver>);

fn build_clients(cfg: &AppConfig, provider: GeneratorProvider) -> Result<Clients, ConfigError> {
    match provider {
        GeneratorProvider::Fake => {
            let client: Arc<dyn LlmClient> = Arc::new(FakeClient::new(cfg.generator.model.clone()));
            let resolver: Arc<dyn VehicleIdentifierResolver> =
                Arc::new(StaticResolver::new(FAKE_RESOLVED_VEHICLE));
            Ok((client, resolver))
        }
        GeneratorProvider::Openai => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    ConfigError(
                        "OPENAI_API_KEY is not set (use --generator fake for offline runs)".into(),
                    )
                })?;

            let timeout = Duration::from_secs(cfg.generator.timeout_secs);
            let base_url = cfg
                .generator
                .base_url
                .clone()
                .unwrap_or_else(|| carfacts_core::providers::llm::openai::DEFAULT_BASE_URL.into());

            let mut generator = OpenAIClient::new(
                cfg.generator.model.clone(),
                api_key.clone(),
                cfg.generator.max_tokens,
            )
            .with_base_url(base_url.clone())
            .with_timeout(timeout)
            .map_err(|e| ConfigError(format!("failed to build HTTP client: {}", e)))?;
            if let Some(t) = cfg.generator.temperature {
                generator = generator.with_temperature(t);
            }

            let vision = OpenAIClient::new(cfg.resolver.model.clone(), api_key, cfg.resolver.max_tokens)
                .with_base_url(base_url)
                .with_timeout(timeout)
                .map_err(|e| ConfigError(format!("failed to build HTTP client: {}", e)))?;

            let client: Arc<dyn LlmClient> = Arc::new(generator);
            let resolver: Arc<dyn VehicleIdentifierResolver> =
                Arc::new(OpenAiVisionResolver::new(vision));
            Ok((client, resolver))
        }
    }
}
