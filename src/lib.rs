pub mod epub;
pub mod pipeline;

// === 核心API重新导出 ===

/// EPUB读取器（主要接口）
pub use epub::EpubReader;

/// 错误处理
pub use epub::{EpubError, Result};

// === 数据结构 ===

/// 书籍模型
pub use epub::{Book, Manifest, Spine};

/// 导航文档
pub use epub::{NavPoint, NavigationDocument};

// === 底层组件（高级用法） ===

/// 容器组件
pub use epub::{Container, ContainerArchive, RootFile};

/// 解析器组件
pub use epub::{NcxParser, Opf};

// === 改写管线 ===

pub use pipeline::{
    IdentityTransform, PipelineConfig, RewritePipeline, RewriteReport, TaskResult, TaskStatus,
    TextTransform, UppercaseTransform, create_transform,
};

// === 库信息 ===

/// InkForge库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// InkForge库的描述
pub const DESCRIPTION: &str = "一个用于批量改写EPUB文本内容的Rust库";

// === 便捷函数 ===

/// 快速打开EPUB文件
///
/// 这是 `EpubReader::new` 的便捷包装函数。
///
/// # 参数
/// * `path` - EPUB文件路径
///
/// # 返回值
/// * `Result<EpubReader>` - EPUB读取器实例
///
/// # 示例
///
/// ```rust,no_run
/// let reader = inkforge::open("book.epub")?;
/// println!("书名: {}", reader.book().name);
/// # Ok::<(), inkforge::EpubError>(())
/// ```
pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<EpubReader> {
    EpubReader::new(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_description() {
        assert!(!DESCRIPTION.is_empty());
    }
}
