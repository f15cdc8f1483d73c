//! 文本变换能力模块
//!
//! 改写管线消费的外部能力接口：纯粹的字符串到字符串变换，
//! 由调用方注入。内置的变换通过注册表按名称构造。

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// 文本变换能力
///
/// 实现必须是纯函数式的：无共享状态，可被多个工作线程并发调用。
pub trait TextTransform: Send + Sync {
    /// 将一段文本变换为新文本
    fn convert(&self, text: &str) -> String;
}

/// 恒等变换，原样返回输入
pub struct IdentityTransform;

impl TextTransform for IdentityTransform {
    fn convert(&self, text: &str) -> String {
        text.to_string()
    }
}

/// 大写变换
pub struct UppercaseTransform;

impl TextTransform for UppercaseTransform {
    fn convert(&self, text: &str) -> String {
        text.to_uppercase()
    }
}

/// 变换构造函数
pub type TransformConstructor = fn() -> Arc<dyn TextTransform>;

/// 名称到构造函数的注册表，新的变换在此登记即可被按名构造
static TRANSFORMS: Lazy<HashMap<&'static str, TransformConstructor>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, TransformConstructor> = HashMap::new();
    map.insert("identity", || Arc::new(IdentityTransform));
    map.insert("uppercase", || Arc::new(UppercaseTransform));
    map
});

/// 按名称构造变换
///
/// # 参数
/// * `name` - 注册表中的变换名称
///
/// # 返回值
/// * `Option<Arc<dyn TextTransform>>` - 未注册的名称返回None
pub fn create_transform(name: &str) -> Option<Arc<dyn TextTransform>> {
    TRANSFORMS.get(name).map(|constructor| constructor())
}

/// 列出已注册的变换名称
pub fn transform_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = TRANSFORMS.keys().copied().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let transform = create_transform("identity").unwrap();
        assert_eq!(transform.convert("原样返回"), "原样返回");
    }

    #[test]
    fn test_uppercase_transform() {
        let transform = create_transform("uppercase").unwrap();
        assert_eq!(transform.convert("hello"), "HELLO");
    }

    #[test]
    fn test_unknown_transform() {
        assert!(create_transform("missing").is_none());
    }

    #[test]
    fn test_transform_names_sorted() {
        assert_eq!(transform_names(), vec!["identity", "uppercase"]);
    }
}
