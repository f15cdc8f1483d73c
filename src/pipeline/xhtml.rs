//! XHTML段落改写模块
//!
//! 对单个XHTML文档做流式改写：定位body中第一个div容器，
//! 只改写其直接子元素中的段落（p元素），段落的全部文本内容
//! 替换为变换结果；其余事件原样写回，未改写区域保持字节不变。

use crate::epub::error::{EpubError, Result};
use crate::pipeline::transform::TextTransform;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// 改写一个XHTML文档中的段落文本
///
/// 改写范围：body中按文档顺序出现的第一个div容器的直接p子元素。
/// 非p的直接子元素、嵌套在更深层的段落以及后续的div容器都保持不变。
/// 段落内部的标记会被变换后的纯文本取代。
///
/// # 参数
/// * `content` - XHTML文档内容
/// * `transform` - 文本变换能力
///
/// # 返回值
/// * `Result<String>` - 改写后的文档；body中没有div容器时返回`RewriteError`
pub fn rewrite_paragraphs(content: &str, transform: &dyn TextTransform) -> Result<String> {
    let mut reader = Reader::from_str(content);
    // 不修剪文本也不展开空元素，保证未改写区域逐字节回写
    let mut writer = Writer::new(Vec::new());

    let mut in_body = false;
    let mut container_found = false;
    let mut in_container = false;
    // 容器内当前打开的子元素层数，0表示位于直接子元素层
    let mut child_depth = 0usize;

    // 段落捕获状态
    let mut capturing = false;
    let mut p_start: Option<BytesStart<'static>> = None;
    let mut p_depth = 0usize;
    let mut p_text = String::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                if capturing {
                    // 段落内部的标记会被变换后的文本取代
                    p_depth += 1;
                } else if in_container && child_depth == 0 && e.local_name().as_ref() == b"p" {
                    capturing = true;
                    p_depth = 0;
                    p_text.clear();
                    p_start = Some(e.into_owned());
                } else {
                    if in_container {
                        child_depth += 1;
                    } else if in_body && !container_found && e.local_name().as_ref() == b"div" {
                        container_found = true;
                        in_container = true;
                        child_depth = 0;
                    } else if e.local_name().as_ref() == b"body" {
                        in_body = true;
                    }
                    writer.write_event(Event::Start(e))?;
                }
            }
            Event::End(e) => {
                if capturing {
                    if p_depth == 0 {
                        if let Some(start) = p_start.take() {
                            let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
                            writer.write_event(Event::Start(start))?;
                            let converted = transform.convert(&p_text);
                            if !converted.is_empty() {
                                writer.write_event(Event::Text(BytesText::new(&converted)))?;
                            }
                            writer.write_event(Event::End(BytesEnd::new(name)))?;
                        }
                        capturing = false;
                    } else {
                        p_depth -= 1;
                    }
                } else if in_container {
                    if child_depth == 0 {
                        // 容器自身结束，之后的div不再处理
                        in_container = false;
                    } else {
                        child_depth -= 1;
                    }
                    writer.write_event(Event::End(e))?;
                } else {
                    if e.local_name().as_ref() == b"body" {
                        in_body = false;
                    }
                    writer.write_event(Event::End(e))?;
                }
            }
            Event::Empty(e) => {
                if capturing {
                    // 段落内部空元素同样被文本取代
                } else if in_container && child_depth == 0 && e.local_name().as_ref() == b"p" {
                    let converted = transform.convert("");
                    if converted.is_empty() {
                        writer.write_event(Event::Empty(e))?;
                    } else {
                        let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                        writer.write_event(Event::Start(e))?;
                        writer.write_event(Event::Text(BytesText::new(&converted)))?;
                        writer.write_event(Event::End(BytesEnd::new(name)))?;
                    }
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::Text(e) => {
                if capturing {
                    p_text.push_str(&e.decode().map_err(quick_xml::Error::from)?);
                } else {
                    writer.write_event(Event::Text(e))?;
                }
            }
            Event::CData(e) => {
                if capturing {
                    p_text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                } else {
                    writer.write_event(Event::CData(e))?;
                }
            }
            Event::GeneralRef(e) => {
                if capturing {
                    p_text.push_str(&crate::epub::xml::resolve_general_ref(&e));
                } else {
                    writer.write_event(Event::GeneralRef(e))?;
                }
            }
            other => {
                if !capturing {
                    writer.write_event(other)?;
                }
            }
        }
    }

    if !container_found {
        return Err(EpubError::RewriteError(
            "文档body中没有div容器".to_string(),
        ));
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| EpubError::RewriteError(format!("改写结果不是有效的UTF-8: {}", e)))
}
