//! Packaging Adapter - 电子书打包服务客户端

mod fake_packager;
mod http_packager_client;

pub use fake_packager::FakePackager;
pub use http_packager_client::{HttpPackagerClient, HttpPackagerClientConfig};
