//! EPUB读取器模块
//!
//! 按固定顺序装配书籍模型：打开并校验归档 → 解析容器描述符 →
//! 解析OPF包文档 → 解析NCX导航文档。任一阶段失败都会以
//! `InitError`整体失败，不暴露部分构建的模型。

use std::path::Path;
use std::sync::Arc;

use crate::epub::archive::ContainerArchive;
use crate::epub::book::{Book, BookBuilder};
use crate::epub::container::Container;
use crate::epub::error::{EpubError, Result};
use crate::epub::ncx::NcxParser;
use crate::epub::opf::Opf;

/// 表示一个已装配完成的EPUB
///
/// 读取器在其生命周期内独占书籍模型与底层归档句柄；
/// `close`落盘并释放句柄，提前退出时由归档的Drop尽力落盘。
pub struct EpubReader {
    archive: Arc<ContainerArchive>,
    book: Book,
    resource_path: String,
}

impl EpubReader {
    /// 从文件路径创建EpubReader实例
    ///
    /// # 参数
    /// * `path` - EPUB文件的路径
    ///
    /// # 返回值
    /// * `Result<EpubReader>` - 成功返回实例；归档校验或任一解析
    ///   阶段失败均返回`InitError`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<EpubReader> {
        let archive = Arc::new(ContainerArchive::open(path)?);

        // 容器描述符给出包文档路径
        let container_xml = archive
            .read_text("META-INF/container.xml")
            .map_err(|e| EpubError::InitError(format!("读取container.xml失败: {}", e)))?;
        let container = Container::parse_xml(&container_xml)
            .map_err(|e| EpubError::InitError(format!("解析container.xml失败: {}", e)))?;
        let opf_path = container.opf_path().ok_or_else(|| {
            EpubError::InitError("container.xml中没有有效的rootfile".to_string())
        })?;

        // 包文档阶段
        let opf_xml = archive
            .read_text(&opf_path)
            .map_err(|e| EpubError::InitError(format!("读取包文档失败: {}", e)))?;
        let opf = Opf::parse_xml(&opf_xml, &opf_path)
            .map_err(|e| EpubError::InitError(format!("解析包文档失败: {}", e)))?;
        let resource_path = opf.resource_path.clone();
        let navigation_file_path = opf.package.spine.navigation_file_path.clone();

        // 导航文档阶段
        let ncx_xml = archive
            .read_text(&navigation_file_path)
            .map_err(|e| EpubError::InitError(format!("读取导航文档失败: {}", e)))?;
        let navigation = NcxParser::parse_xml(&ncx_xml)
            .map_err(|e| EpubError::InitError(format!("解析导航文档失败: {}", e)))?;

        let book = BookBuilder::new()
            .package_document(opf.package)
            .navigation(navigation)
            .build()?;

        Ok(EpubReader {
            archive,
            book,
            resource_path,
        })
    }

    /// 获取装配完成的书籍模型
    pub fn book(&self) -> &Book {
        &self.book
    }

    /// 获取资源根目录
    pub fn resource_path(&self) -> &str {
        &self.resource_path
    }

    /// 将清单相对路径解析为归档绝对路径
    pub fn resolve_manifest_path(&self, file_path: &str) -> String {
        if self.resource_path == "/" {
            format!("/{}", file_path)
        } else {
            format!("{}/{}", self.resource_path, file_path)
        }
    }

    /// 读取清单条目的文本内容（相对路径，自动冠以资源根目录）
    pub fn read_manifest(&self, file_path: &str) -> Result<String> {
        self.archive.read_text(&self.resolve_manifest_path(file_path))
    }

    /// 覆盖清单条目的文本内容（相对路径，自动冠以资源根目录）
    pub fn write_manifest(&self, file_path: &str, content: &str) -> Result<()> {
        self.archive
            .write_text(&self.resolve_manifest_path(file_path), content)
    }

    /// 按归档绝对路径读取文本内容（导航文档、容器描述符等）
    pub fn read_file(&self, entry_path: &str) -> Result<String> {
        self.archive.read_text(entry_path)
    }

    /// 按归档绝对路径读取二进制内容
    pub fn read_binary_file(&self, entry_path: &str) -> Result<Vec<u8>> {
        self.archive.read_binary(entry_path)
    }

    /// 按归档绝对路径覆盖文本内容
    pub fn write_file(&self, entry_path: &str, content: &str) -> Result<()> {
        self.archive.write_text(entry_path, content)
    }

    /// 共享归档句柄，供改写管线的工作线程使用
    pub(crate) fn archive_handle(&self) -> Arc<ContainerArchive> {
        Arc::clone(&self.archive)
    }

    /// 落盘并释放归档
    pub fn close(self) -> Result<()> {
        let EpubReader { archive, .. } = self;
        match Arc::try_unwrap(archive) {
            Ok(archive) => archive.close(),
            // 仍有工作线程持有句柄时只落盘，句柄随最后一个引用释放
            Err(archive) => archive.flush(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    pub(crate) const CONTAINER_XML: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
    <rootfiles>
        <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
    </rootfiles>
</container>"#;

    pub(crate) const CONTENT_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="2.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
        <dc:title>測試書籍</dc:title>
        <dc:creator>測試作者</dc:creator>
        <dc:language>zh-TW</dc:language>
    </metadata>
    <manifest>
        <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
        <item id="a" href="text/a.xhtml" media-type="application/xhtml+xml"/>
        <item id="b" href="text/b.xhtml" media-type="application/xhtml+xml"/>
        <item id="css" href="style/c.css" media-type="text/css"/>
    </manifest>
    <spine toc="ncx">
        <itemref idref="a"/>
        <itemref idref="b"/>
    </spine>
</package>"#;

    pub(crate) const TOC_NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
    <head>
        <meta name="dtb:uid" content="urn:uuid:0001"/>
    </head>
    <docTitle><text>測試書籍</text></docTitle>
    <navMap>
        <navPoint id="np-1" playOrder="1">
            <navLabel><text>第一章</text></navLabel>
            <content src="text/a.xhtml"/>
        </navPoint>
        <navPoint id="np-2" playOrder="2">
            <navLabel><text>第二章</text></navLabel>
            <content src="text/b.xhtml"/>
        </navPoint>
    </navMap>
</ncx>"#;

    pub(crate) const CHAPTER_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>第一章</title></head>
<body><div><p>這是第一段。</p><p>這是第二段。</p></div></body>
</html>"#;

    pub(crate) const CHAPTER_B: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>第二章</title></head>
<body><div><p>另一章的段落。</p><span>保持原樣</span></div></body>
</html>"#;

    pub(crate) const STYLE_CSS: &str = "p { margin: 0; }\n";

    /// 创建一个测试用的完整EPUB文件
    pub(crate) fn create_test_epub(dir: &Path, name: &str) -> PathBuf {
        let entries: Vec<(&str, &str)> = vec![
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", CONTAINER_XML),
            ("OEBPS/content.opf", CONTENT_OPF),
            ("OEBPS/toc.ncx", TOC_NCX),
            ("OEBPS/text/a.xhtml", CHAPTER_A),
            ("OEBPS/text/b.xhtml", CHAPTER_B),
            ("OEBPS/style/c.css", STYLE_CSS),
        ];

        let path = dir.join(name);
        let file = File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (entry, content) in entries {
            zip.start_file(entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn test_reader_assembles_book() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_test_epub(dir.path(), "book.epub");

        let reader = EpubReader::new(&path).unwrap();
        let book = reader.book();

        assert_eq!(book.name, "測試書籍");
        assert_eq!(book.language, "zh-TW");
        assert_eq!(book.manifest.len(), 4);
        assert_eq!(book.spine.navigation_file_path, "/OEBPS/toc.ncx");
        assert_eq!(book.navigation.navigation_points.len(), 2);
        assert_eq!(reader.resource_path(), "/OEBPS");
    }

    #[test]
    fn test_spine_references_resolve_in_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_test_epub(dir.path(), "integrity.epub");

        let reader = EpubReader::new(&path).unwrap();
        let book = reader.book();

        for idref in &book.spine.reading_order {
            assert!(book.manifest.contains_key(idref));
        }
        // 导航文档路径等于toc清单项路径冠以资源根目录
        let ncx = book.manifest.get("ncx").unwrap();
        assert_eq!(
            book.spine.navigation_file_path,
            format!("{}/{}", reader.resource_path(), ncx.file_path)
        );
    }

    #[test]
    fn test_read_manifest_resolves_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_test_epub(dir.path(), "resolve.epub");

        let reader = EpubReader::new(&path).unwrap();
        let content = reader.read_manifest("text/a.xhtml").unwrap();
        assert!(content.contains("這是第一段。"));

        // 归档绝对路径读取导航文档
        let ncx = reader.read_file("/OEBPS/toc.ncx").unwrap();
        assert!(ncx.contains("navMap"));
    }

    #[test]
    fn test_write_manifest_then_close_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_test_epub(dir.path(), "persist.epub");

        let reader = EpubReader::new(&path).unwrap();
        reader
            .write_manifest("text/a.xhtml", "<html><body><div><p>改</p></div></body></html>")
            .unwrap();
        reader.close().unwrap();

        let reopened = EpubReader::new(&path).unwrap();
        let content = reopened.read_manifest("text/a.xhtml").unwrap();
        assert!(content.contains("改"));
    }

    #[test]
    fn test_unparsable_package_document_fails_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.epub");
        let file = File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);
        for (entry, content) in [
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", CONTAINER_XML),
            ("OEBPS/content.opf", "<package><spine toc=\"missing\"/></package>"),
        ] {
            zip.start_file(entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();

        assert!(matches!(
            EpubReader::new(&path),
            Err(EpubError::InitError(_))
        ));
    }
}
