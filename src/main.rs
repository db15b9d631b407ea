//! QuillForge - 书籍生成编排服务
//!
//! 启动顺序：配置 -> 日志 -> 数据库 -> 外部服务客户端 -> worker -> HTTP

use std::sync::Arc;
use std::time::Duration;

use quillforge::application::{
    ArtifactPackagerPort, ArtifactStorePort, AudiobookSettings, GenerationSettings,
    ImageGeneratorPort, Narrator, SpeechSynthesizerPort, TextGeneratorPort,
};
use quillforge::config::{load_config, print_config, AppConfig, Provider};
use quillforge::domain::audiobook::RateTable;
use quillforge::infrastructure::adapters::{
    FakeGeneratorScript, FakeImageGenerator, FakePackager, FakeSpeechSynthesizer,
    FakeTextGenerator, FileArtifactStore, HttpImageClient, HttpImageClientConfig,
    HttpPackagerClient, HttpPackagerClientConfig, HttpSpeechClient, HttpSpeechClientConfig,
    HttpTextClient, HttpTextClientConfig,
};
use quillforge::infrastructure::events::EventPublisher;
use quillforge::infrastructure::http::{AppPorts, AppState, HttpServer, ServerConfig};
use quillforge::infrastructure::memory::{ChannelWorkQueue, InMemoryCreditLedger};
use quillforge::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteAudiobookRepository, SqliteBookRepository,
    SqliteChapterRepository, SqliteGenerationJobRepository, SqliteUsageRepository,
};
use quillforge::infrastructure::worker::{
    AudiobookOrchestrator, AudiobookWorker, AudiobookWorkerConfig, GenerationCollaborators,
    GenerationScheduler, GenerationWorker, GenerationWorkerConfig,
};
use tokio_util::sync::CancellationToken;

/// 外部服务客户端
struct Collaborators {
    text: Arc<dyn TextGeneratorPort>,
    image: Arc<dyn ImageGeneratorPort>,
    speech: Arc<dyn SpeechSynthesizerPort>,
    packager: Arc<dyn ArtifactPackagerPort>,
}

fn build_collaborators(config: &AppConfig) -> anyhow::Result<Collaborators> {
    match config.generation.provider {
        Provider::Fake => {
            tracing::warn!("Using fake collaborators, no external service will be called");
            let script = FakeGeneratorScript::new();
            Ok(Collaborators {
                text: Arc::new(FakeTextGenerator::new(script.clone())),
                image: Arc::new(FakeImageGenerator::new(script.clone())),
                speech: Arc::new(FakeSpeechSynthesizer::new(script)),
                packager: Arc::new(FakePackager::new()),
            })
        }
        Provider::Http => {
            let generation = &config.generation;
            let text = HttpTextClient::new(
                HttpTextClientConfig::new(&generation.text_url)
                    .with_model(&generation.text_model)
                    .with_api_key(generation.api_key.clone())
                    .with_timeout(generation.timeout_secs),
            )?;
            let image = HttpImageClient::new(HttpImageClientConfig {
                url: generation.image_url.clone(),
                api_key: generation.api_key.clone().filter(|k| !k.is_empty()),
                model: generation.image_model.clone(),
                timeout_secs: generation.timeout_secs,
            })?;
            let speech = HttpSpeechClient::new(
                HttpSpeechClientConfig::new(&config.speech.url)
                    .with_api_key(config.speech.api_key.clone())
                    .with_timeout(config.speech.timeout_secs),
            )?;
            let packager = HttpPackagerClient::new(HttpPackagerClientConfig {
                base_url: config.packaging.url.clone(),
                timeout_secs: config.packaging.timeout_secs,
            })?;
            Ok(Collaborators {
                text: Arc::new(text),
                image: Arc::new(image),
                speech: Arc::new(speech),
                packager: Arc::new(packager),
            })
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},quillforge={},tower_http=debug,sqlx=warn",
        config.log.level, config.log.level
    );
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("QuillForge {}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    // 确保数据目录存在
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig::new(&config.database.path, config.database.max_connections);
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    // Repository 适配器
    let book_repo = Arc::new(SqliteBookRepository::new(pool.clone()));
    let job_repo = Arc::new(SqliteGenerationJobRepository::new(pool.clone()));
    let chapter_repo = Arc::new(SqliteChapterRepository::new(pool.clone()));
    let usage_repo = Arc::new(SqliteUsageRepository::new(pool.clone()));
    let audiobook_repo = Arc::new(SqliteAudiobookRepository::new(pool.clone()));

    let artifact_store: Arc<dyn ArtifactStorePort> = Arc::new(
        FileArtifactStore::new(&config.storage.artifact_dir, &config.storage.public_path).await?,
    );
    let collaborators = build_collaborators(&config)?;

    let event_publisher = EventPublisher::new().arc();
    let credit_gate = InMemoryCreditLedger::new(
        config.credits.enabled,
        config.credits.default_allowance,
    )
    .arc();
    let (work_queue, wake) = ChannelWorkQueue::new();
    let work_queue = Arc::new(work_queue);

    let rates = RateTable::new(config.speech.rates.clone());
    let narrator = Arc::new(Narrator::new(
        collaborators.speech.clone(),
        artifact_store.clone(),
        rates.clone(),
    ));

    // 后台 worker
    let shutdown = CancellationToken::new();

    let scheduler = Arc::new(GenerationScheduler::new(
        GenerationWorkerConfig {
            worker_id: config.worker.worker_id.clone(),
            poll_interval: Duration::from_millis(config.worker.poll_interval_ms),
            max_concurrent_jobs: config.worker.max_concurrent_jobs,
            stale_after: Duration::from_secs(config.worker.stale_after_secs),
            chapter_images: config.generation.chapter_images,
        },
        GenerationCollaborators {
            text_generator: collaborators.text.clone(),
            image_generator: collaborators.image.clone(),
            artifact_store: artifact_store.clone(),
        },
        book_repo.clone(),
        job_repo.clone(),
        chapter_repo.clone(),
        usage_repo.clone(),
        event_publisher.clone(),
    ));
    let generation_worker = tokio::spawn(
        GenerationWorker::new(scheduler, wake.generation).run(shutdown.clone()),
    );

    let orchestrator = Arc::new(AudiobookOrchestrator::new(
        narrator.clone(),
        chapter_repo.clone(),
        audiobook_repo.clone(),
        event_publisher.clone(),
    ));
    let audiobook_worker = tokio::spawn(
        AudiobookWorker::new(
            AudiobookWorkerConfig {
                poll_interval: Duration::from_millis(config.worker.poll_interval_ms),
                ..Default::default()
            },
            orchestrator,
            wake.audiobook,
        )
        .run(shutdown.clone()),
    );

    // HTTP 服务器
    let state = AppState::new(
        AppPorts {
            book_repo,
            job_repo,
            chapter_repo,
            usage_repo,
            audiobook_repo,
            artifact_store,
            packager: collaborators.packager,
            credit_gate,
            work_queue,
            narrator,
            event_publisher,
        },
        GenerationSettings {
            default_chapter_count: config.generation.default_chapter_count,
            credit_cost: config.generation.credit_cost,
        },
        AudiobookSettings {
            voices: config.speech.voices.clone(),
            default_voice: config.speech.default_voice.clone(),
            default_model: config.speech.default_model.clone(),
            rates,
            sample_characters: config.speech.sample_characters,
        },
    );

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        max_upload_size: config.server.max_upload_size,
        artifact_dir: config.storage.artifact_dir.clone(),
        public_path: config.storage.public_path.clone(),
    };
    let server = HttpServer::new(server_config, state);

    // 启动服务器（带优雅关闭）
    let server_shutdown = shutdown.clone();
    server
        .run_with_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
            server_shutdown.cancel();
        })
        .await?;

    // 等待 worker 完成进行中的任务
    shutdown.cancel();
    let _ = tokio::join!(generation_worker, audiobook_worker);

    tracing::info!("Server shutdown complete");

    Ok(())
}
