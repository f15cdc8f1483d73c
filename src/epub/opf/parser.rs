//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）包文档的XML解析功能。

use crate::epub::book::{Manifest, PackageDocument, Spine};
use crate::epub::error::{EpubError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;
use std::path::Path;

/// 语言元素缺失时使用的默认语言代码
const DEFAULT_LANGUAGE: &str = "en";

/// OPF包文档的解析结果
#[derive(Debug, Clone)]
pub struct Opf {
    /// 包文档阶段的书籍数据
    pub package: PackageDocument,
    /// 资源根目录：包文档自身所在目录冠以`/`，位于归档根时为`/`
    pub resource_path: String,
}

/// 解析器内部的区块状态
#[derive(PartialEq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
}

impl Opf {
    /// 解析OPF包文档内容
    ///
    /// 元数据取`metadata`元素的直接子元素中带`dc:`前缀者，
    /// 键为去掉前缀的本地名，同名后者覆盖前者；书名与语言取
    /// 第一个直接子元素（其他位置的同名元素一律忽略）。
    /// 清单项以id为键；spine的toc属性解析为清单id并结合资源根目录
    /// 得到导航文档路径，itemref按文档顺序收集且不去重。
    ///
    /// # 参数
    /// * `xml_content` - OPF文件的XML内容
    /// * `opf_path` - 包文档自身在归档内的路径，用于推导资源根目录
    ///
    /// # 返回值
    /// * `Result<Opf>` - 解析后的包文档信息
    pub fn parse_xml(xml_content: &str, opf_path: &str) -> Result<Opf> {
        let resource_path = Self::resolve_resource_path(opf_path);

        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut title: Option<String> = None;
        let mut language: Option<String> = None;
        let mut metadata: HashMap<String, String> = HashMap::new();
        let mut manifest: HashMap<String, Manifest> = HashMap::new();
        let mut reading_order: Vec<String> = Vec::new();
        let mut spine_toc: Option<String> = None;

        let mut buf = Vec::new();
        let mut section = Section::None;
        // metadata元素内当前打开的子元素层数，1表示直接子元素
        let mut metadata_depth = 0usize;
        // 当前正在收集文本的直接子元素（去掉前缀的本地名）
        let mut current_dc: Option<String> = None;
        let mut text_content = String::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                    match section {
                        Section::None => match local_name.as_str() {
                            "metadata" => {
                                section = Section::Metadata;
                                metadata_depth = 0;
                            }
                            "manifest" => section = Section::Manifest,
                            "spine" => {
                                section = Section::Spine;
                                spine_toc = Self::attr_value(e, b"toc")?;
                            }
                            _ => {}
                        },
                        Section::Metadata => {
                            metadata_depth += 1;
                            if metadata_depth == 1 {
                                current_dc = Self::dc_local_name(e);
                                text_content.clear();
                            }
                        }
                        Section::Manifest => {
                            if local_name == "item" {
                                Self::parse_manifest_item(e, &mut manifest)?;
                            }
                        }
                        Section::Spine => {
                            if local_name == "itemref" {
                                Self::parse_spine_itemref(e, &mut reading_order)?;
                            }
                        }
                    }
                }
                Event::Empty(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                    match section {
                        Section::None if local_name == "spine" => {
                            spine_toc = Self::attr_value(e, b"toc")?;
                        }
                        Section::Metadata if metadata_depth == 0 => {
                            if let Some(key) = Self::dc_local_name(e) {
                                Self::commit_metadata(
                                    &key,
                                    "",
                                    &mut title,
                                    &mut language,
                                    &mut metadata,
                                );
                            }
                        }
                        Section::Manifest if local_name == "item" => {
                            Self::parse_manifest_item(e, &mut manifest)?;
                        }
                        Section::Spine if local_name == "itemref" => {
                            Self::parse_spine_itemref(e, &mut reading_order)?;
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                    match section {
                        Section::Metadata => {
                            if metadata_depth == 0 {
                                if local_name == "metadata" {
                                    section = Section::None;
                                }
                            } else {
                                if metadata_depth == 1 {
                                    if let Some(key) = current_dc.take() {
                                        Self::commit_metadata(
                                            &key,
                                            text_content.trim(),
                                            &mut title,
                                            &mut language,
                                            &mut metadata,
                                        );
                                    }
                                }
                                metadata_depth -= 1;
                            }
                        }
                        Section::Manifest if local_name == "manifest" => {
                            section = Section::None;
                        }
                        Section::Spine if local_name == "spine" => {
                            section = Section::None;
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    if current_dc.is_some() {
                        text_content.push_str(&e.decode().map_err(quick_xml::Error::from)?);
                    }
                }
                Event::GeneralRef(ref e) => {
                    if current_dc.is_some() {
                        text_content.push_str(&crate::epub::xml::resolve_general_ref(e));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let spine = Self::resolve_spine(&resource_path, spine_toc, reading_order, &manifest)?;

        Ok(Opf {
            package: PackageDocument {
                name: title.unwrap_or_default(),
                language: language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                metadata,
                manifest,
                spine,
            },
            resource_path,
        })
    }

    /// 推导资源根目录：包文档的父目录冠以`/`，位于归档根时为`/`
    fn resolve_resource_path(opf_path: &str) -> String {
        let opf_path = opf_path.trim_start_matches('/');
        match Path::new(opf_path).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                format!("/{}", parent.to_string_lossy())
            }
            _ => "/".to_string(),
        }
    }

    /// 元素的限定名带`dc:`前缀时返回去掉前缀的本地名
    fn dc_local_name(e: &BytesStart) -> Option<String> {
        let qualified = e.name();
        if qualified.as_ref().starts_with(b"dc:") {
            Some(String::from_utf8_lossy(e.local_name().as_ref()).to_string())
        } else {
            None
        }
    }

    /// 记录一个元数据键值；书名和语言只取第一个出现的直接子元素
    fn commit_metadata(
        key: &str,
        value: &str,
        title: &mut Option<String>,
        language: &mut Option<String>,
        metadata: &mut HashMap<String, String>,
    ) {
        match key {
            "title" if title.is_none() => *title = Some(value.to_string()),
            "language" if language.is_none() => *language = Some(value.to_string()),
            _ => {}
        }
        metadata.insert(key.to_string(), value.to_string());
    }

    /// 读取单个属性值
    fn attr_value(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
        for attr_result in e.attributes() {
            let attr = attr_result
                .map_err(|err| EpubError::XmlError(quick_xml::Error::InvalidAttr(err)))?;
            if attr.key.local_name().as_ref() == name {
                return Ok(Some(String::from_utf8_lossy(&attr.value).to_string()));
            }
        }
        Ok(None)
    }

    /// 解析清单项
    fn parse_manifest_item(e: &BytesStart, manifest: &mut HashMap<String, Manifest>) -> Result<()> {
        let id = Self::attr_value(e, b"id")?;
        let href = Self::attr_value(e, b"href")?;
        let media_type = Self::attr_value(e, b"media-type")?;

        if let (Some(id), Some(href), Some(media_type)) = (id, href, media_type) {
            manifest.insert(id.clone(), Manifest::new(id, href, media_type));
        }

        Ok(())
    }

    /// 解析脊柱项的idref，保持文档顺序且不去重
    fn parse_spine_itemref(e: &BytesStart, reading_order: &mut Vec<String>) -> Result<()> {
        if let Some(idref) = Self::attr_value(e, b"idref")? {
            reading_order.push(idref);
        }
        Ok(())
    }

    /// 解析toc引用并校验阅读顺序的引用完整性
    fn resolve_spine(
        resource_path: &str,
        spine_toc: Option<String>,
        reading_order: Vec<String>,
        manifest: &HashMap<String, Manifest>,
    ) -> Result<Spine> {
        let toc_id = spine_toc
            .ok_or_else(|| EpubError::OpfParseError("spine元素缺少toc属性".to_string()))?;

        let toc_item = manifest.get(&toc_id).ok_or_else(|| {
            EpubError::OpfParseError(format!("spine的toc引用了不存在的清单项: {}", toc_id))
        })?;

        for idref in &reading_order {
            if !manifest.contains_key(idref) {
                return Err(EpubError::OpfParseError(format!(
                    "itemref引用了不存在的清单项: {}",
                    idref
                )));
            }
        }

        let navigation_file_path = if resource_path == "/" {
            format!("/{}", toc_item.file_path)
        } else {
            format!("{}/{}", resource_path, toc_item.file_path)
        };

        Ok(Spine::new(navigation_file_path, reading_order))
    }
}
