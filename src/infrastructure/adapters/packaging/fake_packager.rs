//! Fake Packager - 纯文本打包
//!
//! 把书稿渲染为可读文本，用于本地运行和测试

use async_trait::async_trait;

use crate::application::ports::{ArtifactPackagerPort, Manuscript, PackagingError};
use crate::domain::book::PublishFormat;

#[derive(Debug, Default)]
pub struct FakePackager;

impl FakePackager {
    pub fn new() -> Self {
        Self
    }

    pub fn render(manuscript: &Manuscript, format: PublishFormat) -> String {
        let mut out = format!("[{}] {}\n", format.as_str(), manuscript.title);
        if let Some(cover) = &manuscript.cover_image_url {
            out.push_str(&format!("cover: {}\n", cover));
        }
        for chapter in &manuscript.chapters {
            out.push_str(&format!("\n## {}. {}\n", chapter.number, chapter.title));
            if let Some(image) = &chapter.image_url {
                out.push_str(&format!("image: {}\n", image));
            }
            out.push_str(&chapter.text);
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl ArtifactPackagerPort for FakePackager {
    async fn package(&self, manuscript: &Manuscript, format: PublishFormat) -> Result<Vec<u8>, PackagingError> {
        Ok(Self::render(manuscript, format).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ManuscriptChapter;

    #[tokio::test]
    async fn test_renders_chapters_in_order() {
        let manuscript = Manuscript {
            title: "Tides".into(),
            cover_image_url: None,
            chapters: vec![
                ManuscriptChapter {
                    number: 1,
                    title: "Arrival".into(),
                    text: "She came ashore.".into(),
                    image_url: Some("/media/1.png".into()),
                },
                ManuscriptChapter {
                    number: 2,
                    title: "Storm".into(),
                    text: String::new(),
                    image_url: None,
                },
            ],
        };

        let bytes = FakePackager::new().package(&manuscript, PublishFormat::Epub).await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("[epub] Tides"));
        assert!(text.find("## 1. Arrival").unwrap() < text.find("## 2. Storm").unwrap());
        assert!(text.contains("image: /media/1.png"));
    }
}
