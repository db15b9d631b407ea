//! Chapter Pipeline - 单章子流水线
//!
//! 正文 -> 插图提示词（可跳过）-> 插图（启用时）-> 完成
//! 每一步的结果立即持久化，失败记录在章节上并返回给调度器

use std::future::Future;
use std::sync::Arc;

use crate::application::ports::{
    ArtifactStorePort, ChapterRepositoryPort, ImageGeneratorPort, TextGeneratorPort,
    UsageRepositoryPort,
};
use crate::application::{chapter_image_key, ApplicationError};
use crate::domain::book::{Book, OutlineEntry};
use crate::domain::generation::{
    Chapter, ChapterStep, GenerationJob, TokenUsage, UsageEntry, UsageStep,
};
use crate::infrastructure::events::EventPublisher;

use super::prompts;

/// 流水线配置
#[derive(Debug, Clone)]
pub struct ChapterPipelineConfig {
    /// 是否生成章节插图
    pub chapter_images: bool,
}

impl Default for ChapterPipelineConfig {
    fn default() -> Self {
        Self {
            chapter_images: true,
        }
    }
}

/// 章节流水线
pub struct ChapterPipeline {
    config: ChapterPipelineConfig,
    text_generator: Arc<dyn TextGeneratorPort>,
    image_generator: Arc<dyn ImageGeneratorPort>,
    artifact_store: Arc<dyn ArtifactStorePort>,
    chapter_repo: Arc<dyn ChapterRepositoryPort>,
    usage_repo: Arc<dyn UsageRepositoryPort>,
    event_publisher: Arc<EventPublisher>,
}

impl ChapterPipeline {
    pub fn new(
        config: ChapterPipelineConfig,
        text_generator: Arc<dyn TextGeneratorPort>,
        image_generator: Arc<dyn ImageGeneratorPort>,
        artifact_store: Arc<dyn ArtifactStorePort>,
        chapter_repo: Arc<dyn ChapterRepositoryPort>,
        usage_repo: Arc<dyn UsageRepositoryPort>,
        event_publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            config,
            text_generator,
            image_generator,
            artifact_store,
            chapter_repo,
            usage_repo,
            event_publisher,
        }
    }

    /// 该书是否需要生成章节插图
    fn wants_images(&self, book: &Book) -> bool {
        self.config.chapter_images && !book.publish_without_chapter_images
    }

    /// 执行单章；已完成的章节直接返回
    pub async fn run(
        &self,
        book: &Book,
        job: &GenerationJob,
        entry: &OutlineEntry,
        previous_summary: Option<&str>,
    ) -> Result<Chapter, ApplicationError> {
        let mut chapter = match self.chapter_repo.find(book.id, entry.number).await? {
            Some(chapter) => chapter,
            None => Chapter::new(book.id, entry.number, entry.title.clone()),
        };

        if chapter.is_complete() {
            tracing::debug!(job_id = %job.id, chapter = chapter.number, "Chapter already complete, skipping");
            return Ok(chapter);
        }

        if !chapter.has_text() {
            let prompt = prompts::chapter_text(book, entry, job.total_chapters, previous_summary);
            let output = self
                .attempt(&mut chapter, job, ChapterStep::Text, async {
                    Ok(self.text_generator.generate_text(&prompt).await?)
                })
                .await?;
            chapter.record_text(prompt, output.content);
            self.save(&chapter).await?;
            self.record_usage(job, chapter.number, UsageStep::ChapterText, output.usage)
                .await?;
        }

        if !book.context.skip_image_prompts && chapter.image_prompt.is_none() {
            let text = chapter.text.clone().unwrap_or_default();
            let prompt = prompts::image_prompt(book, chapter.number, &chapter.title, &text);
            let output = self
                .attempt(&mut chapter, job, ChapterStep::ImagePrompt, async {
                    Ok(self.text_generator.generate_text(&prompt).await?)
                })
                .await?;
            chapter.record_image_prompt(output.content.trim().to_string());
            self.save(&chapter).await?;
            self.record_usage(job, chapter.number, UsageStep::ImagePrompt, output.usage)
                .await?;
        }

        if self.wants_images(book) && !chapter.has_image() {
            if let Some(image_prompt) = chapter.image_prompt.clone() {
                let number = chapter.number;
                let (url, usage) = self
                    .attempt(&mut chapter, job, ChapterStep::Image, async {
                        let image = self.image_generator.generate_image(&image_prompt).await?;
                        let key = chapter_image_key(book.id, number, &image.extension);
                        let url = self.artifact_store.put(&key, &image.data).await?;
                        Ok((url, image.usage))
                    })
                    .await?;
                chapter.record_image(url);
                self.save(&chapter).await?;
                self.record_usage(job, number, UsageStep::ChapterImage, usage).await?;
            }
        }

        chapter.mark_complete();
        self.save(&chapter).await?;

        tracing::info!(
            job_id = %job.id,
            book_id = %book.id,
            chapter = chapter.number,
            word_count = chapter.metadata.word_count,
            "Chapter complete"
        );
        Ok(chapter)
    }

    /// 执行一个步骤：标记进行中，失败时写入章节失败状态
    async fn attempt<T, F>(
        &self,
        chapter: &mut Chapter,
        job: &GenerationJob,
        step: ChapterStep,
        call: F,
    ) -> Result<T, ApplicationError>
    where
        F: Future<Output = Result<T, ApplicationError>>,
    {
        chapter.begin(step);
        self.save(chapter).await?;

        match call.await {
            Ok(output) => Ok(output),
            Err(e) => {
                tracing::warn!(
                    job_id = %job.id,
                    chapter = chapter.number,
                    step = step.as_str(),
                    error = %e,
                    "Chapter step failed"
                );
                chapter.fail(step, e.to_string());
                self.save(chapter).await?;
                Err(e)
            }
        }
    }

    async fn save(&self, chapter: &Chapter) -> Result<(), ApplicationError> {
        self.chapter_repo.upsert(chapter).await?;
        self.event_publisher.publish_chapter(chapter);
        Ok(())
    }

    async fn record_usage(
        &self,
        job: &GenerationJob,
        chapter_number: u32,
        step: UsageStep,
        usage: TokenUsage,
    ) -> Result<(), ApplicationError> {
        let entry = UsageEntry::new(job.book_id, Some(job.id), Some(chapter_number), step, usage);
        self.usage_repo.append(&entry).await?;
        Ok(())
    }
}
