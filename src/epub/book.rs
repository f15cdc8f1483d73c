//! 书籍模型模块
//!
//! 提供装配完成后的书籍内存模型：元数据、清单、阅读顺序与导航文档。
//! 模型分两个阶段装配（包文档阶段与导航文档阶段），装配完成后只读。

use std::collections::HashMap;

use crate::epub::error::{EpubError, Result};
use crate::epub::ncx::NavigationDocument;

/// 清单项信息
#[derive(Debug, Clone)]
pub struct Manifest {
    /// 项目ID（清单中的唯一键）
    pub id: String,
    /// 文件路径（相对于资源根目录）
    pub file_path: String,
    /// 媒体类型
    pub media_type: String,
}

impl Manifest {
    /// 创建新的清单项
    pub fn new(id: String, file_path: String, media_type: String) -> Self {
        Self {
            id,
            file_path,
            media_type,
        }
    }

    /// 检查是否为XHTML文档（批量改写的筛选条件）
    pub fn is_xhtml(&self) -> bool {
        self.media_type == "application/xhtml+xml"
    }
}

/// 脊柱信息（阅读顺序）
#[derive(Debug, Clone)]
pub struct Spine {
    /// 导航文档在归档内的绝对路径，
    /// 由spine的toc属性经清单解析并冠以资源根目录得到
    pub navigation_file_path: String,
    /// 按文档顺序排列的清单ID列表，允许重复
    pub reading_order: Vec<String>,
}

impl Spine {
    /// 创建新的脊柱信息
    pub fn new(navigation_file_path: String, reading_order: Vec<String>) -> Self {
        Self {
            navigation_file_path,
            reading_order,
        }
    }
}

/// 装配完成的书籍模型
///
/// 构建完成后不可变；改写管线只读取此模型，写操作全部经由归档层进行。
#[derive(Debug, Clone)]
pub struct Book {
    /// 书名（dc:title，缺失时为空字符串）
    pub name: String,
    /// 语言（dc:language，缺失时为"en"）
    pub language: String,
    /// 包文档元数据，键为去掉dc:前缀的元素名，同名后者覆盖前者
    pub metadata: HashMap<String, String>,
    /// 清单，键为清单项ID
    pub manifest: HashMap<String, Manifest>,
    /// 阅读顺序
    pub spine: Spine,
    /// 导航文档
    pub navigation: NavigationDocument,
}

/// 包文档阶段的解析产物
#[derive(Debug, Clone)]
pub struct PackageDocument {
    pub name: String,
    pub language: String,
    pub metadata: HashMap<String, String>,
    pub manifest: HashMap<String, Manifest>,
    pub spine: Spine,
}

/// 两阶段的书籍构建器
///
/// 包文档阶段与导航文档阶段都完成后才能得到`Book`，
/// 部分构建的模型不会暴露给管线代码。
#[derive(Debug, Default)]
pub struct BookBuilder {
    package: Option<PackageDocument>,
    navigation: Option<NavigationDocument>,
}

impl BookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 包文档阶段：记录元数据、清单与阅读顺序
    pub fn package_document(mut self, package: PackageDocument) -> Self {
        self.package = Some(package);
        self
    }

    /// 导航文档阶段：记录导航文档
    pub fn navigation(mut self, navigation: NavigationDocument) -> Self {
        self.navigation = Some(navigation);
        self
    }

    /// 完成装配
    ///
    /// # 返回值
    /// * `Result<Book>` - 任一阶段缺失时返回`InitError`
    pub fn build(self) -> Result<Book> {
        let package = self
            .package
            .ok_or_else(|| EpubError::InitError("书籍模型缺少包文档阶段".to_string()))?;
        let navigation = self
            .navigation
            .ok_or_else(|| EpubError::InitError("书籍模型缺少导航文档阶段".to_string()))?;

        Ok(Book {
            name: package.name,
            language: package.language,
            metadata: package.metadata,
            manifest: package.manifest,
            spine: package.spine,
            navigation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_package() -> PackageDocument {
        let mut manifest = HashMap::new();
        manifest.insert(
            "ch1".to_string(),
            Manifest::new(
                "ch1".to_string(),
                "text/ch1.xhtml".to_string(),
                "application/xhtml+xml".to_string(),
            ),
        );
        PackageDocument {
            name: "测试书籍".to_string(),
            language: "zh".to_string(),
            metadata: HashMap::new(),
            manifest,
            spine: Spine::new("/OEBPS/toc.ncx".to_string(), vec!["ch1".to_string()]),
        }
    }

    #[test]
    fn test_builder_requires_both_phases() {
        let result = BookBuilder::new().package_document(sample_package()).build();
        assert!(matches!(result, Err(EpubError::InitError(_))));

        let result = BookBuilder::new()
            .navigation(NavigationDocument::default())
            .build();
        assert!(matches!(result, Err(EpubError::InitError(_))));
    }

    #[test]
    fn test_builder_completes_with_both_phases() {
        let book = BookBuilder::new()
            .package_document(sample_package())
            .navigation(NavigationDocument::default())
            .build()
            .unwrap();

        assert_eq!(book.name, "测试书籍");
        assert_eq!(book.spine.reading_order, vec!["ch1".to_string()]);
        assert!(book.manifest.get("ch1").unwrap().is_xhtml());
    }

    #[test]
    fn test_manifest_is_xhtml() {
        let xhtml = Manifest::new(
            "a".to_string(),
            "a.xhtml".to_string(),
            "application/xhtml+xml".to_string(),
        );
        let css = Manifest::new("b".to_string(), "b.css".to_string(), "text/css".to_string());
        assert!(xhtml.is_xhtml());
        assert!(!css.is_xhtml());
    }
}
