//! QuillForge - 书籍生成编排服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Book Context: 书籍、大纲、目录枚举
//! - Generation Context: 生成任务与章节状态机、用量
//! - Audiobook Context: 有声书任务、附加音频、计价
//! - 发布就绪评估
//!
//! 应用层 (application/):
//! - Ports: Repositories, 生成服务, 产物存储, 打包, 额度, 工作队列
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket 进度推送
//! - Worker: 生成调度器、章节流水线、有声书编排器
//! - Persistence: SQLite
//! - Adapters: 文本/图片/语音/打包服务客户端，文件产物存储
//! - Memory: 额度账本、worker 唤醒通道
//! - Events: 进度事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
