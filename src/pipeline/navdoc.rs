//! 导航文档改写模块
//!
//! 对NCX导航文档做整体改写：文档中任意位置的text元素都被替换为
//! 同名的新元素，内容为变换结果（原有属性与内部标记不保留），
//! 并以带缩进的可读格式重新序列化。

use crate::epub::error::{EpubError, Result};
use crate::pipeline::transform::TextTransform;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// 改写导航文档中的全部text元素
///
/// # 参数
/// * `content` - NCX文档内容
/// * `transform` - 文本变换能力
///
/// # 返回值
/// * `Result<String>` - 带缩进重新序列化后的文档
pub fn rewrite_text_elements(content: &str, transform: &dyn TextTransform) -> Result<String> {
    let mut reader = Reader::from_str(content);
    // 丢弃原有的排版空白，由带缩进的写出端重新排版
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    let mut capturing = false;
    let mut depth = 0usize;
    let mut text_content = String::new();

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                if capturing {
                    depth += 1;
                } else if e.local_name().as_ref() == b"text" {
                    capturing = true;
                    depth = 0;
                    text_content.clear();
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Event::End(e) => {
                if capturing {
                    if depth == 0 {
                        write_text_element(&mut writer, transform, &text_content)?;
                        capturing = false;
                    } else {
                        depth -= 1;
                    }
                } else {
                    writer.write_event(Event::End(e))?;
                }
            }
            Event::Empty(e) => {
                if capturing {
                    // 原text元素的内部标记不保留
                } else if e.local_name().as_ref() == b"text" {
                    write_text_element(&mut writer, transform, "")?;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::Text(e) => {
                if capturing {
                    text_content.push_str(&e.decode().map_err(quick_xml::Error::from)?);
                } else {
                    writer.write_event(Event::Text(e))?;
                }
            }
            Event::CData(e) => {
                if capturing {
                    text_content.push_str(&String::from_utf8_lossy(&e.into_inner()));
                } else {
                    writer.write_event(Event::CData(e))?;
                }
            }
            Event::GeneralRef(e) => {
                if capturing {
                    text_content.push_str(&crate::epub::xml::resolve_general_ref(&e));
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

    String::from_utf8(writer.into_inner())
        .map_err(|e| EpubError::RewriteError(format!("改写结果不是有效的UTF-8: {}", e)))
}

/// 写出一个全新的text元素，内容为变换结果
fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    transform: &dyn TextTransform,
    original: &str,
) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("text")))?;
    let converted = transform.convert(original);
    if !converted.is_empty() {
        writer.write_event(Event::Text(BytesText::new(&converted)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("text")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::transform::UppercaseTransform;

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
    <head><meta name="dtb:uid" content="u"/></head>
    <docTitle><text>book title</text></docTitle>
    <navMap>
        <navPoint id="np-1" playOrder="1">
            <navLabel><text class="x">chapter one</text></navLabel>
            <content src="a.xhtml"/>
        </navPoint>
    </navMap>
</ncx>"#;

    #[test]
    fn test_all_text_elements_rewritten() {
        let result = rewrite_text_elements(NCX, &UppercaseTransform).unwrap();
        assert!(result.contains("<text>BOOK TITLE</text>"));
        assert!(result.contains("<text>CHAPTER ONE</text>"));
        assert!(!result.contains("book title"));
    }

    #[test]
    fn test_text_attributes_dropped() {
        // 替换后的text元素是全新构造的，不保留原有属性
        let result = rewrite_text_elements(NCX, &UppercaseTransform).unwrap();
        assert!(!result.contains(r#"class="x""#));
    }

    #[test]
    fn test_other_elements_preserved() {
        let result = rewrite_text_elements(NCX, &UppercaseTransform).unwrap();
        assert!(result.contains(r#"<meta name="dtb:uid" content="u"/>"#));
        assert!(result.contains(r#"<content src="a.xhtml"/>"#));
        assert!(result.contains(r#"playOrder="1""#));
    }

    #[test]
    fn test_output_is_indented() {
        let result = rewrite_text_elements(NCX, &UppercaseTransform).unwrap();
        // 重新序列化后为带缩进的可读格式
        assert!(result.contains("\n  "));
    }
}
