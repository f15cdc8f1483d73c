//! XML实体引用处理
//!
//! quick-xml将文本中的实体引用作为独立的GeneralRef事件报告，
//! 收集文本内容时需要把它们还原为字符。

use quick_xml::events::BytesRef;

/// 将一个实体引用还原为文本
///
/// 预定义实体与字符引用还原为对应字符，未知的命名实体原样保留。
pub(crate) fn resolve_general_ref(r: &BytesRef) -> String {
    let entity = String::from_utf8_lossy(r.as_ref());

    match entity.as_ref() {
        "amp" => return "&".to_string(),
        "lt" => return "<".to_string(),
        "gt" => return ">".to_string(),
        "quot" => return "\"".to_string(),
        "apos" => return "'".to_string(),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16) {
            if let Some(c) = char::from_u32(code) {
                return c.to_string();
            }
        }
    } else if let Some(dec) = entity.strip_prefix('#') {
        if let Ok(code) = dec.parse::<u32>() {
            if let Some(c) = char::from_u32(code) {
                return c.to_string();
            }
        }
    }

    format!("&{};", entity)
}
