//! NCX解析器模块
//!
//! 提供NCX导航文档的XML解析功能。

use crate::epub::error::{EpubError, Result};
use crate::epub::ncx::{NavPoint, NavigationDocument};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// 解析中的导航点，text与content取第一个出现的后代
struct PartialNavPoint {
    id: String,
    order: u32,
    text: Option<String>,
    content_ref: Option<String>,
}

/// 解析器内部的区块状态
#[derive(PartialEq)]
enum Section {
    None,
    Head,
    DocTitle,
    DocAuthor,
    NavMap,
}

/// NCX导航文档解析器
pub struct NcxParser;

impl NcxParser {
    /// 解析NCX导航文档内容
    ///
    /// 头部元数据取`head`下`meta`元素的name→content属性对；
    /// 标题与作者分别取`docTitle`/`docAuthor`下第一个`text`后代的文本，
    /// 元素缺失时字段置空而非报错；导航点取`navMap`的直接`navPoint`
    /// 子元素，以id为键，playOrder解析失败视为`NcxParseError`。
    ///
    /// # 参数
    /// * `xml_content` - NCX文件的XML内容
    ///
    /// # 返回值
    /// * `Result<NavigationDocument>` - 解析后的导航文档
    pub fn parse_xml(xml_content: &str) -> Result<NavigationDocument> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);

        let mut title: Option<String> = None;
        let mut author: Option<String> = None;
        let mut metadata: HashMap<String, String> = HashMap::new();
        let mut navigation_points: HashMap<String, NavPoint> = HashMap::new();

        let mut buf = Vec::new();
        let mut section = Section::None;
        // navMap元素内当前打开的子元素层数，1表示直接子元素
        let mut navmap_depth = 0usize;
        let mut current_point: Option<PartialNavPoint> = None;
        // 正在收集text元素的文本
        let mut collecting_text = false;
        let mut text_content = String::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                    match section {
                        Section::None => match local_name.as_str() {
                            "head" => section = Section::Head,
                            "docTitle" => section = Section::DocTitle,
                            "docAuthor" => section = Section::DocAuthor,
                            "navMap" => {
                                section = Section::NavMap;
                                navmap_depth = 0;
                            }
                            _ => {}
                        },
                        Section::Head => {
                            if local_name == "meta" {
                                Self::parse_meta(e, &mut metadata)?;
                            }
                        }
                        Section::DocTitle => {
                            if local_name == "text" && title.is_none() && !collecting_text {
                                collecting_text = true;
                                text_content.clear();
                            }
                        }
                        Section::DocAuthor => {
                            if local_name == "text" && author.is_none() && !collecting_text {
                                collecting_text = true;
                                text_content.clear();
                            }
                        }
                        Section::NavMap => {
                            if navmap_depth == 0 && local_name == "navPoint" {
                                current_point = Some(Self::begin_nav_point(e)?);
                            } else if let Some(point) = current_point.as_mut() {
                                if local_name == "text" && point.text.is_none() && !collecting_text
                                {
                                    collecting_text = true;
                                    text_content.clear();
                                } else if local_name == "content" && point.content_ref.is_none() {
                                    point.content_ref =
                                        Some(Self::attr_value(e, b"src")?.unwrap_or_default());
                                }
                            }
                            navmap_depth += 1;
                        }
                    }
                }
                Event::Empty(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                    match section {
                        Section::Head if local_name == "meta" => {
                            Self::parse_meta(e, &mut metadata)?;
                        }
                        Section::NavMap => {
                            if navmap_depth == 0 && local_name == "navPoint" {
                                let point = Self::begin_nav_point(e)?;
                                Self::commit_nav_point(point, &mut navigation_points);
                            } else if let Some(ref mut point) = current_point {
                                if local_name == "content" && point.content_ref.is_none() {
                                    let src = Self::attr_value(e, b"src")?.unwrap_or_default();
                                    point.content_ref = Some(src);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let local_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                    match section {
                        Section::Head if local_name == "head" => section = Section::None,
                        Section::DocTitle => {
                            if collecting_text && local_name == "text" {
                                title = Some(text_content.trim().to_string());
                                collecting_text = false;
                            } else if local_name == "docTitle" {
                                section = Section::None;
                            }
                        }
                        Section::DocAuthor => {
                            if collecting_text && local_name == "text" {
                                author = Some(text_content.trim().to_string());
                                collecting_text = false;
                            } else if local_name == "docAuthor" {
                                section = Section::None;
                            }
                        }
                        Section::NavMap => {
                            if navmap_depth == 0 {
                                if local_name == "navMap" {
                                    section = Section::None;
                                }
                            } else {
                                if collecting_text && local_name == "text" {
                                    if let Some(ref mut point) = current_point {
                                        point.text = Some(text_content.trim().to_string());
                                    }
                                    collecting_text = false;
                                }
                                if navmap_depth == 1 && local_name == "navPoint" {
                                    if let Some(point) = current_point.take() {
                                        Self::commit_nav_point(point, &mut navigation_points);
                                    }
                                }
                                navmap_depth -= 1;
                            }
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    if collecting_text {
                        text_content.push_str(&e.decode().map_err(quick_xml::Error::from)?);
                    }
                }
                Event::GeneralRef(ref e) => {
                    if collecting_text {
                        text_content.push_str(&crate::epub::xml::resolve_general_ref(e));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(NavigationDocument {
            title,
            author,
            metadata,
            navigation_points,
        })
    }

    /// 解析meta元素的name/content属性对
    fn parse_meta(e: &BytesStart, metadata: &mut HashMap<String, String>) -> Result<()> {
        let name = Self::attr_value(e, b"name")?;
        let content = Self::attr_value(e, b"content")?;
        if let (Some(name), Some(content)) = (name, content) {
            metadata.insert(name, content);
        }
        Ok(())
    }

    /// 解析navPoint元素的属性，开始一个新的导航点
    fn begin_nav_point(e: &BytesStart) -> Result<PartialNavPoint> {
        let id = Self::attr_value(e, b"id")?.unwrap_or_default();
        let play_order = Self::attr_value(e, b"playOrder")?.unwrap_or_default();
        let order = play_order.parse::<u32>().map_err(|_| {
            EpubError::NcxParseError(format!(
                "navPoint({})的playOrder不是有效整数: {:?}",
                id, play_order
            ))
        })?;

        Ok(PartialNavPoint {
            id,
            order,
            text: None,
            content_ref: None,
        })
    }

    /// 将解析完成的导航点记入映射
    fn commit_nav_point(point: PartialNavPoint, map: &mut HashMap<String, NavPoint>) {
        map.insert(
            point.id.clone(),
            NavPoint {
                order: point.order,
                id: point.id,
                text: point.text.unwrap_or_default(),
                content_ref: point.content_ref.unwrap_or_default(),
            },
        );
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
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
    <head>
        <meta name="dtb:uid" content="urn:uuid:0001"/>
        <meta name="dtb:depth" content="1"/>
    </head>
    <docTitle><text>测试书籍</text></docTitle>
    <docAuthor><text>测试作者</text></docAuthor>
    <navMap>
        <navPoint id="np-2" playOrder="2">
            <navLabel><text>第二章</text></navLabel>
            <content src="text/chapter2.xhtml"/>
        </navPoint>
        <navPoint id="np-1" playOrder="1">
            <navLabel><text>第一章</text></navLabel>
            <content src="text/chapter1.xhtml"/>
        </navPoint>
    </navMap>
</ncx>"#;

    #[test]
    fn test_parse_basic_ncx() {
        let doc = NcxParser::parse_xml(SAMPLE_NCX).unwrap();

        assert_eq!(doc.title, Some("测试书籍".to_string()));
        assert_eq!(doc.author, Some("测试作者".to_string()));
        assert_eq!(
            doc.metadata.get("dtb:uid"),
            Some(&"urn:uuid:0001".to_string())
        );
        assert_eq!(doc.navigation_points.len(), 2);

        let np1 = doc.navigation_points.get("np-1").unwrap();
        assert_eq!(np1.order, 1);
        assert_eq!(np1.text, "第一章");
        assert_eq!(np1.content_ref, "text/chapter1.xhtml");
    }

    #[test]
    fn test_sorted_view_follows_play_order() {
        let doc = NcxParser::parse_xml(SAMPLE_NCX).unwrap();
        let ids: Vec<&str> = doc.sorted_points().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["np-1", "np-2"]);
    }

    #[test]
    fn test_missing_title_and_author_left_unset() {
        let xml = r#"<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/">
<head><meta name="dtb:uid" content="x"/></head>
<navMap></navMap>
</ncx>"#;

        let doc = NcxParser::parse_xml(xml).unwrap();
        assert_eq!(doc.title, None);
        assert_eq!(doc.author, None);
        assert!(doc.navigation_points.is_empty());
    }

    #[test]
    fn test_nested_nav_points_are_not_separate_entries() {
        let xml = r#"<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/">
<navMap>
    <navPoint id="parent" playOrder="1">
        <navLabel><text>第一章</text></navLabel>
        <content src="ch1.xhtml"/>
        <navPoint id="child" playOrder="2">
            <navLabel><text>第一节</text></navLabel>
            <content src="ch1.xhtml#s1"/>
        </navPoint>
    </navPoint>
</navMap>
</ncx>"#;

        let doc = NcxParser::parse_xml(xml).unwrap();
        // 只有navMap的直接子元素进入映射
        assert_eq!(doc.navigation_points.len(), 1);
        assert!(doc.navigation_points.contains_key("parent"));
    }

    #[test]
    fn test_invalid_play_order_is_an_error() {
        let xml = r#"<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/">
<navMap>
    <navPoint id="bad" playOrder="abc">
        <navLabel><text>坏点</text></navLabel>
        <content src="x.xhtml"/>
    </navPoint>
</navMap>
</ncx>"#;

        assert!(matches!(
            NcxParser::parse_xml(xml),
            Err(EpubError::NcxParseError(_))
        ));
    }
}
